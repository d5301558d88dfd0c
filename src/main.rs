use geoconnex_rs::{ClientOptions, GeoconnexClient, GeoconnexError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GeoconnexError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = GeoconnexClient::with_options(ClientOptions::from_env()?);
    let long_island = [-73.2, 40.5, -73.0, 41.0];

    println!("Fetching features inside Long Island bbox...");
    let inside = client.get_features_inside_bbox(&long_island, None).await?;
    println!("Got {} features inside", inside.features.len());

    println!("Fetching features intersecting Long Island bbox...");
    let intersecting = client
        .get_features_intersecting_bbox(&long_island, None)
        .await?;
    println!("Got {} features intersecting", intersecting.features.len());

    if let Some(first) = inside.features.first() {
        println!("First feature: {:?}", first.properties);
    }

    let point = (-73.1, 40.9);
    println!("Locating catchment at {:?}...", point);
    match client
        .get_catchment_with_mainstem_metadata_at_point(point)
        .await?
    {
        Some(catchment) => println!("Catchment: {:?}", catchment.properties),
        None => println!("No catchment contains {:?}", point),
    }

    Ok(())
}
