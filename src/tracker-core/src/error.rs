use snafu::{Location, Snafu};

use crate::RegionId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(module, visibility(pub))]
pub enum Error {
    #[snafu(display("Region '{region}' has an invalid {zone}: {reason}"))]
    InvalidRegion {
        #[snafu(implicit)]
        location: Location,
        region: RegionId,
        zone: &'static str,
        reason: String,
    },
    #[snafu(display("Unknown region '{value}'"))]
    UnknownRegion {
        #[snafu(implicit)]
        location: Location,
        value: String,
        source: strum::ParseError,
    },
}
