pub mod record;
pub mod region;
pub mod set;

pub use record::RegionRecord;
pub use region::*;
pub use set::RegionSet;
