pub(crate) mod access_codes;
pub(crate) mod attempts;
pub(crate) mod results;
