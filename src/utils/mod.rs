// Utilities module
//
// This module contains common utility functions:
// - validation: Common validation helpers

pub mod validation;
