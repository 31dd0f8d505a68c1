// Copyright Kani Contributors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared representation of loop-free programs used by verification
//! condition generation and contract inference: typed expressions, commands,
//! basic blocks kept in an index-addressed arena, procedure contracts and the
//! closed formulas handed to a prover.

pub mod interned_string;
pub mod vc_program;

pub use interned_string::InternedString;
pub use vc_program::*;
