//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod hint;
pub mod mac_addr;
pub mod mpls;
pub mod task;

pub type UnboundedSender<T> = tokio::sync::mpsc::UnboundedSender<T>;
pub type UnboundedReceiver<T> = tokio::sync::mpsc::UnboundedReceiver<T>;

// ===== macros =====

/// Asserts that two byte slices are equal, printing differences in hex format
/// if they are not.
#[macro_export]
macro_rules! assert_eq_hex {
    ($left:expr, $right:expr) => {
        if $left != $right {
            panic!(
                "assertion `left == right` failed\n  left: [{}]\n right: [{}]",
                $left
                    .iter()
                    .map(|b| format!("0x{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(", "),
                $right
                    .iter()
                    .map(|b| format!("0x{:02x}", b))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    };
}
