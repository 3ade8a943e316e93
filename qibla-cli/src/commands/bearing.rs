//! Bearing command - great-circle bearing and distance to the target.

use qibla::geo::{bearing_to, distance_km, GeoPoint};

use super::common::resolve_target;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the bearing command.
pub struct BearingArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub target_latitude: Option<f64>,
    pub target_longitude: Option<f64>,
}

/// Run the bearing command.
pub fn run(args: BearingArgs, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("bearing");

    let observer = GeoPoint::new(args.latitude, args.longitude)?;
    let target = resolve_target(args.target_latitude, args.target_longitude, runner.config())?;

    let bearing = bearing_to(&observer, &target);
    let distance = distance_km(&observer, &target);

    println!("Observer: {}", observer);
    println!("Target:   {}", target);
    println!("Bearing:  {:.2}°", bearing);
    println!("Distance: {:.1} km", distance);

    Ok(())
}
