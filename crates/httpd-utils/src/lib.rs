//! Small shared helpers used across the httpd workspace: panic/assert macros
//! that behave like their std counterparts in debug builds but degrade to a
//! logged error in release builds, so a single malformed connection can never
//! take the whole process down.
mod assert;
