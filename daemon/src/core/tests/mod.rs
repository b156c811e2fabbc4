mod support;
mod swap;
