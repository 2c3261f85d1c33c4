//! Cross-module engine tests.
