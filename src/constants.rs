/// Column names of the listings schema.
/// Every column is optional; stages check presence before touching one.
pub const ID: &str = "id";
pub const ADDRESS: &str = "address";
pub const PRICE: &str = "price";
pub const SQUARE_FEET: &str = "square_feet";
pub const BATHROOMS: &str = "bathrooms";
pub const BEDROOMS: &str = "bedrooms";
pub const STATE: &str = "state";
pub const TIME: &str = "time";
pub const SOURCE: &str = "source";
pub const HAS_PHOTO: &str = "has_photo";
pub const PETS_ALLOWED: &str = "pets_allowed";

// Derived columns
pub const PRICE_PER_SQFT: &str = "price_per_sqft";
pub const POST_DATE: &str = "post_date";
pub const SOURCE_GROUPED: &str = "source_grouped";
pub const SQUARE_FEET_BIN: &str = "square_feet_bin";

/// Columns coerced to numbers during cleaning, in processing order
pub const NUMERIC_COLUMNS: [&str; 4] = [PRICE, SQUARE_FEET, BATHROOMS, BEDROOMS];

/// Text values the source uses in place of an empty cell
pub const NULL_SENTINELS: [&str; 2] = ["null", "None"];

pub const DEFAULT_BATHROOMS: i64 = 1;
/// Used only when `bedrooms` has no values at all to take a median from
pub const FALLBACK_BEDROOMS: f64 = 0.0;

pub const PET_TYPES: [&str; 2] = ["Cats", "Dogs"];

/// Sources below this share of all rows are collapsed into `OTHER_SOURCE`
pub const RARE_SOURCE_SHARE: f64 = 0.01;
pub const OTHER_SOURCE: &str = "Other";

pub const SQUARE_FEET_BIN_WIDTH: f64 = 500.0;
