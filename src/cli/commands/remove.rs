use crate::config::Config;
use crate::db::Store;
use crate::domain::title_slug;

pub async fn cmd_remove_anime(config: &Config, title: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let slug = title_slug(title);

    let links = store.streaming_links_for_title(title).await?;
    if links.is_empty() {
        println!("No streaming links stored for '{title}' (slug: {slug}).");
        return Ok(());
    }

    println!("Remove {} streaming links for '{}'?", links.len(), title);
    println!("Enter 'y' to confirm, anything else to cancel:");

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim().eq_ignore_ascii_case("y") {
        let removed = store.remove_streaming_links(title).await?;
        println!("✓ Removed {removed} links for: {slug}");
    } else {
        println!("Cancelled.");
    }

    Ok(())
}
