pub mod browser;
pub mod classify;
pub mod command;
pub mod config;
pub mod element;
pub mod error;
pub mod field;
pub mod filler;
pub mod llm;
pub mod page;
pub mod progress;
pub mod prompt;
pub mod resolver;
pub mod response;
pub mod status;
pub mod surface;

pub use browser::AutofillBrowser;
pub use command::{Command, Reply, ReplyStatus};
pub use config::{BrowserBuilder, Config};
pub use error::{Error, FieldError, Result};
pub use field::{ButtonInfo, FieldKind, FieldOption, FormField, ScannedField};
pub use filler::{FormFiller, PageOutcome, PageReport, SessionState};
pub use llm::{CompletionClient, TextGenerator};
pub use page::Page;
pub use response::{AiResponse, Outcome};
pub use status::{StatusChannel, StatusUpdate};
pub use surface::FormSurface;
