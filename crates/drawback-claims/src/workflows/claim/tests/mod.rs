mod common;
mod detector;
mod groups;
mod routing;
