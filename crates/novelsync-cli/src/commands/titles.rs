use crate::OutputFormat;
use anyhow::{Result, bail};
use console::style;
use novelsync_core::{NewTitle, Title, TitleId, TitleStore};

pub fn list(store: &dyn TitleStore, format: OutputFormat) -> Result<()> {
    let titles = store.list()?;

    if format == OutputFormat::Json {
        return crate::print_json(&titles);
    }

    if titles.is_empty() {
        println!("No titles tracked yet. Add one with `novelsync titles add`.");
        return Ok(());
    }

    for title in &titles {
        print_title(title);
    }
    Ok(())
}

pub fn add(store: &dyn TitleStore, title: NewTitle, format: OutputFormat) -> Result<()> {
    let title = store.insert(title)?;

    match format {
        OutputFormat::Json => crate::print_json(&title)?,
        OutputFormat::Pretty => {
            println!("{} Added title {}", style("✓").green(), style(title.id).bold());
            print_title(&title);
        }
    }
    Ok(())
}

pub fn remove(store: &dyn TitleStore, id: TitleId) -> Result<()> {
    if !store.remove(id)? {
        bail!("Title not found: {}", id);
    }
    println!("{} Removed title {}", style("✓").green(), id);
    Ok(())
}

fn print_title(title: &Title) {
    println!("\n{} {}", style(format!("[{}]", title.id)).cyan(), style(&title.name).bold());
    println!("  Source:   {}", title.source_url);
    println!("  Catalog:  {}", title.catalog_url);
    println!("  Group:    {}", title.group_name);
    if let Some(id) = &title.catalog_series_id {
        println!("  Series id: {}", id);
    }
    if let Some(id) = &title.catalog_group_id {
        println!("  Group id:  {}", id);
    }

    match title.last_checked {
        Some(checked) => println!(
            "  Chapters: {} at source, {} catalogued, {} missing (checked {})",
            title.source_chapters.len(),
            title.catalog_chapters.len(),
            title.missing_chapters().len(),
            checked.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("  Chapters: {}", style("never refreshed").dim()),
    }
}
