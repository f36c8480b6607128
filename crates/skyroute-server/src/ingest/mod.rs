//! Writer half of the geopoint contract: decoded weather observations
//! and the one-time population bootstrap.

pub mod population;
pub mod weather;
