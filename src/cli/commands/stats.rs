use crate::config::Config;
use crate::db::Store;

pub async fn cmd_stats(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let anime = store.anime_stats().await?;
    let streaming = store.streaming_stats().await?;

    println!("Anime: {} total", anime.total);
    for (category, count) in &anime.by_category {
        println!("  {category:<10} {count}");
    }
    println!("Audio:");
    for (audio, count) in &anime.by_audio_type {
        println!("  {audio:<10} {count}");
    }
    println!();
    println!(
        "Streaming links: {} across {} anime",
        streaming.total_links, streaming.unique_anime_count
    );
    if !streaming.sources.is_empty() {
        println!("Sources: {}", streaming.sources.join(", "));
    }

    Ok(())
}
