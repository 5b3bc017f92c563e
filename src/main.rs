use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use reel_sync::{
    services::{
        build_http_client, HttpFavoriteStore, HttpMetadataService, HttpRatingStore, StoreClient,
    },
    sort, Config, DetailResolver, FavoriteListSync, HttpSessionSource, LoadOutcome, MovieRecord,
    RatedItem, RatedListLoader, Session, ViewScope,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let http_client = build_http_client(&config)?;

    let source = Arc::new(HttpSessionSource::new(http_client.clone(), config.api_base.clone()));
    let session = Session::init(source, config.identity_token.clone())
        .await
        .context("Failed to resolve session")?;
    let Some(user_id) = session.user_id().await else {
        anyhow::bail!("IDENTITY_TOKEN is not set; nothing to load");
    };
    tracing::info!(%user_id, "Session ready");

    let store = StoreClient::new(http_client.clone(), config.api_base.clone(), session.clone());
    let metadata = Arc::new(HttpMetadataService::new(http_client, config.metadata_url.clone()));
    let resolver = Arc::new(DetailResolver::new(metadata, config.concurrency()));

    let scope = ViewScope::new();
    let cancel = scope.token();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let favorites = FavoriteListSync::new(Arc::new(HttpFavoriteStore::new(store.clone())), session.clone());
    favorites.load().await.context("Failed to load favorites")?;
    match favorites.load_records(&resolver, &cancel).await? {
        LoadOutcome::Loaded(view) => {
            if let Some(warning) = &view.partial_failure {
                tracing::warn!(%warning, "Some favorites could not be loaded");
            }
            print_favorites(&view.movies);
        }
        LoadOutcome::Canceled => return Ok(()),
    }

    let loader = RatedListLoader::new(Arc::new(HttpRatingStore::new(store)), resolver, session);
    match loader.load(&cancel).await? {
        LoadOutcome::Loaded(view) => {
            if let Some(warning) = &view.partial_failure {
                tracing::warn!(%warning, "Some rated movies could not be loaded");
            }
            print_rated(&sort(&view.items, config.default_sort), config.default_sort.as_str());
        }
        LoadOutcome::Canceled => return Ok(()),
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupted; canceling in-flight loads");
        cancel.cancel();
    }
}

fn print_favorites(movies: &[MovieRecord]) {
    if movies.is_empty() {
        println!("No favorites yet");
        return;
    }
    println!("Favorites:");
    for (rank, movie) in movies.iter().enumerate() {
        println!("{:>3}. {}{}", rank + 1, movie.title, year_suffix(movie));
    }
}

fn print_rated(items: &[RatedItem], mode: &str) {
    if items.is_empty() {
        println!("No rated movies yet");
        return;
    }
    println!("Rated ({}):", mode);
    for item in items {
        let stars = item.user_rating.map(|r| r.get()).unwrap_or(0);
        println!(
            "  {}{} {}{}",
            "*".repeat(stars as usize),
            " ".repeat(5 - stars as usize),
            item.movie.title,
            year_suffix(&item.movie)
        );
    }
}

fn year_suffix(movie: &MovieRecord) -> String {
    movie.year.map(|y| format!(" ({})", y)).unwrap_or_default()
}
