use jobfill::classify::{classify, prepare, Pass};
use jobfill::{AutofillBrowser, Config, FormSurface};

#[tokio::main]
async fn main() -> jobfill::Result<()> {
    let url = std::env::args()
        .nth(1)
        .ok_or_else(|| jobfill::Error::InvalidInput("usage: scan_form <url>".into()))?;
    let config = Config::from_env()?;

    let browser = AutofillBrowser::builder().headless(true).build().await?;
    let page = browser.new_page(&url).await?.with_config(&config);

    println!("Step: {}", page.progress_text().await?);

    let fields = page.scan().await?;
    println!("Found {} labelled fields:", fields.len());
    for field in fields {
        let kind = classify(&field, &config.selectors)
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unhandled".into());
        let label = field.label.clone();
        let pending = prepare(field, Pass::Initial, &config.selectors).is_some();
        println!("  {label} [{kind}]{}", if pending { " (to fill)" } else { "" });
    }

    for button in page.buttons().await? {
        println!("  button '{}' -> #{}", button.text, button.id);
    }

    Ok(())
}
