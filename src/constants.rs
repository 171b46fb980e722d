pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 10;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const COOKING_TIME_MIN: i32 = 1;

// Must agree with the NUMERIC(12, 3) amount column.
pub const AMOUNT_MAX_SCALE: u32 = 3;
pub const AMOUNT_MAX_INTEGER_DIGITS: u32 = 9;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
