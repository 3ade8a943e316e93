//! Declination command - resolve magnetic declination for a location.

use qibla::geo::GeoPoint;

use super::common::format_declination;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the declination command.
pub struct DeclinationArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub offline: bool,
}

/// Run the declination command.
pub fn run(args: DeclinationArgs, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("declination");

    let point = GeoPoint::new(args.latitude, args.longitude)?;
    let provider = runner.declination_provider(args.offline)?;
    let runtime = runner.runtime()?;

    let record = runtime.block_on(provider.resolve(point));

    println!("Location:    {}", point);
    println!("Declination: {}", format_declination(record.degrees));
    println!("Source:      {}", record.source);

    Ok(())
}
