use std::time::Duration;

use clap::Parser;

use aqualert_service::store::{MonitoringPoint, PointStatus};

#[derive(Parser)]
#[command(name = "check-points")]
#[command(about = "Poll the AquaLERT service and print monitoring point status", long_about = None)]
struct Cli {
    /// Base URL of the inference service
    #[arg(long, env = "AQUALERT_URL", default_value = "http://localhost:5000")]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()?;

    let url = format!("{}/api/water_points", cli.base_url.trim_end_matches('/'));
    println!("Checking {}...\n", url);

    // Timeout and connection failure are both recoverable: fall back to the
    // bundled sample view rather than exiting with an error.
    match client.get(&url).send().await {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                println!("Service answered {} - showing sample data instead.\n", status);
                print_points(&aqualert_service::store::WaterPointStore::with_sample_points().snapshot());
                return Ok(());
            }
            let points: Vec<MonitoringPoint> = response.json().await?;
            print_points(&points);
        }
        Err(e) if e.is_timeout() => {
            println!("Request timed out after {}s - showing sample data instead.\n", cli.timeout_secs);
            print_points(&aqualert_service::store::WaterPointStore::with_sample_points().snapshot());
        }
        Err(e) if e.is_connect() => {
            println!("Could not connect to the service ({}) - showing sample data instead.\n", e);
            print_points(&aqualert_service::store::WaterPointStore::with_sample_points().snapshot());
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

fn print_points(points: &[MonitoringPoint]) {
    println!("{} monitoring points:", points.len());
    for point in points {
        let flag = match point.status {
            PointStatus::Potable => "OK     ",
            PointStatus::Caution => "CAUTION",
            PointStatus::NotPotable => "UNSAFE ",
        };
        let verified = if point.verified { " [verified]" } else { "" };
        println!(
            "  [{}] #{} {} ({:.4}, {:.4}){}",
            flag, point.id, point.name, point.lat, point.lon, verified
        );
    }
}
