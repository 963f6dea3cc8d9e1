mod geo;
mod selector;

pub use geo::{meters_to_degrees, GeoPoint};
pub use selector::{
    select_relays, Candidate, RelayCandidate, RelaySelection, DEFAULT_OUTSIDE_THRESHOLD_M,
};
