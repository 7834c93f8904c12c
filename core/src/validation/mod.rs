//! Post-hoc invariant checks over advertised paths, restrictions and solutions
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod correctness;

pub use self::correctness::{
    verify_id_pairing, verify_restriction_membership, verify_routing_load, ValidationError,
};
