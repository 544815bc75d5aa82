use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use venue_scan_core::logging::{self, LogFormat};
use venue_scan_core::{
    ClientConfig, Coordinate, HttpVenueGateway, RequestClient, ScanSession, ScanState, Venue,
    VenueDirectory, VenueListState,
};

const USAGE: &str = "usage: venue-scan venues <latitude> <longitude>\n       venue-scan scan <venue-code>";

#[derive(Debug, PartialEq)]
enum Command {
    Venues(Coordinate),
    Scan(String),
}

/// Validate the arguments before anything touches configuration or the network.
fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["venues", latitude, longitude] => Ok(Command::Venues(Coordinate::new(
            latitude.parse().context("latitude")?,
            longitude.parse().context("longitude")?,
        ))),
        ["scan", venue_code] => Ok(Command::Scan(venue_code.to_string())),
        _ => bail!(USAGE),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogFormat::from_env())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = ClientConfig::from_env().context("venue service configuration")?;
    let client = RequestClient::new(config)?;
    let gateway = Arc::new(HttpVenueGateway::new(client));

    match command {
        Command::Venues(coordinate) => list_venues(VenueDirectory::new(gateway), coordinate).await,
        Command::Scan(venue_code) => scan(ScanSession::start(&Venue::with_code(venue_code), gateway)).await,
    }
}

async fn list_venues(mut directory: VenueDirectory, coordinate: Coordinate) -> anyhow::Result<()> {
    match directory.load(coordinate).await {
        VenueListState::Loaded(venues) if venues.is_empty() => println!("no venues nearby"),
        VenueListState::Loaded(venues) => {
            for venue in venues {
                println!(
                    "{:<12} {:<32} {}",
                    venue.id(),
                    venue.name.as_deref().unwrap_or("-"),
                    venue.formatted_location()
                );
                for location in venue.pax_locations() {
                    let gates: Vec<String> = location.gates().iter().map(|g| g.id()).collect();
                    println!("{:<12}   {} [{}]", "", location.id(), gates.join(", "));
                }
            }
        }
        VenueListState::Failed(message) => bail!("{message}"),
        VenueListState::Idle | VenueListState::Loading => {}
    }
    Ok(())
}

/// Feed stdin lines to the session as barcodes and print every transition.
async fn scan(session: ScanSession) -> anyhow::Result<()> {
    let mut states = session.subscribe();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            match state {
                ScanState::Scanning => println!("ready"),
                ScanState::Processing => println!("validating..."),
                ScanState::Result { success: true, message } => println!("ADMIT  {message}"),
                ScanState::Result { success: false, message } => println!("DENY   {message}"),
                ScanState::Error { message } => println!("ERROR  {message}"),
            }
        }
    });

    let mut watcher = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let barcode = line.trim();
        if barcode.is_empty() {
            continue;
        }
        // Presenting a new ticket is the operator's "scan next".
        if session.state().is_settled() {
            session.scan_next();
            watcher.wait_for(ScanState::accepts_barcodes).await?;
        }
        session.barcode_detected(barcode);
        watcher.wait_for(ScanState::is_settled).await?;
    }

    session.shutdown().await;
    printer.await?;
    Ok(())
}
