pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 200;
pub const SLUG_MAX_LENGTH: usize = 120;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 120;

pub const HEX_COLOR_PATTERN: &str = "^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$";

pub const SESSION_LIFETIME_HOURS: i64 = 24;

// Shopping list document (points, A4 portrait)
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const TEXT_LEFT: f32 = 45.0;
pub const TEXT_TOP: f32 = 790.0;
pub const TEXT_BOTTOM: f32 = 60.0;
pub const FONT_SIZE: f32 = 14.0;
pub const LINE_HEIGHT: f32 = 20.0;
pub const IMAGE_RECT: (f32, f32, f32, f32) = (450.0, 50.0, 100.0, 100.0);

pub const SHOPPING_LIST_SUFFIX: &str = "_shopping_list.pdf";
