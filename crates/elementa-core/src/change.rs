#![forbid(unsafe_code)]

//! Change categories and the template recompute rule.
//!
//! Every mutation that can affect a component's output is tagged with one
//! [`ChangeType`] bit. A render request carries the bitwise OR of every bit
//! that triggered it, and each template declares a fixed `change_on` mask
//! naming the categories it depends on.
//!
//! # Categories
//!
//! | Constant | Bits | Raised by |
//! |----------|------|-----------|
//! | [`ChangeType::NEVER`] | `0` | nothing; template renders once and is then static |
//! | [`ChangeType::PROP`] | `1` | property or attribute change |
//! | [`ChangeType::THEME`] | `2` | theme switch |
//! | [`ChangeType::LANG`] | `4` | locale switch |
//! | [`ChangeType::SUBTREE_PROPS`] | `8` | subtree prop set on an ancestor |
//! | [`ChangeType::GLOBAL_PROPS`] | `16` | global prop set anywhere in the tree |
//! | [`ChangeType::ALWAYS`] | `63` | every category, plus one reserved bit |
//! | [`ChangeType::FORCE`] | `127` | unconditional recompute |
//!
//! # Invariants
//!
//! 1. A `NEVER` template recomputes only for `FORCE` (or when nothing is
//!    cached yet).
//! 2. Any other template recomputes iff its mask intersects the incoming
//!    mask, or nothing is cached yet.
//! 3. An incoming `ALWAYS` intersects every non-`NEVER` mask.

use bitflags::bitflags;

bitflags! {
    /// Bitmask of change categories.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeType: u32 {
        /// A property or attribute changed.
        const PROP = 1 << 0;
        /// The active theme changed.
        const THEME = 1 << 1;
        /// The active locale changed.
        const LANG = 1 << 2;
        /// A subtree prop changed on this component or an ancestor.
        const SUBTREE_PROPS = 1 << 3;
        /// A global prop changed somewhere in the component tree.
        const GLOBAL_PROPS = 1 << 4;
        /// Reserved for a future category. Only ever set as part of `ALWAYS`.
        const RESERVED = 1 << 5;
        /// Every category.
        const ALWAYS = Self::PROP.bits()
            | Self::THEME.bits()
            | Self::LANG.bits()
            | Self::SUBTREE_PROPS.bits()
            | Self::GLOBAL_PROPS.bits()
            | Self::RESERVED.bits();
        /// Recompute regardless of the template's declared mask.
        const FORCE = Self::ALWAYS.bits() | (1 << 6);
    }
}

impl ChangeType {
    /// Never re-render automatically.
    pub const NEVER: Self = Self::empty();
    /// Alias for [`ChangeType::NEVER`], for templates rendered by hand.
    pub const MANUAL: Self = Self::empty();

    /// The categories currently defined, without the reserved bit.
    pub const CATEGORIES: Self = Self::PROP
        .union(Self::THEME)
        .union(Self::LANG)
        .union(Self::SUBTREE_PROPS)
        .union(Self::GLOBAL_PROPS);

    /// Whether this mask never triggers automatic re-rendering.
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.is_empty()
    }

    /// Expand a mask that covers every category (`ALWAYS` or `FORCE`) to
    /// the full set of declared bits. Other masks are returned as-is.
    #[must_use]
    pub fn expanded(self) -> Self {
        if self.contains(Self::CATEGORIES) {
            self | Self::ALWAYS
        } else {
            self
        }
    }
}

/// Decide whether a template declared with `change_on` must recompute for
/// the incoming `change` mask.
///
/// `has_cached` is whether the template already holds a result for the
/// render target in question; without one the template always computes.
#[must_use]
pub fn should_recompute(change_on: ChangeType, change: ChangeType, has_cached: bool) -> bool {
    if !has_cached {
        return true;
    }
    if change == ChangeType::FORCE {
        return true;
    }
    if change_on.is_never() {
        return false;
    }
    change_on.intersects(change.expanded())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_wire_values() {
        assert_eq!(ChangeType::NEVER.bits(), 0);
        assert_eq!(ChangeType::PROP.bits(), 1);
        assert_eq!(ChangeType::THEME.bits(), 2);
        assert_eq!(ChangeType::LANG.bits(), 4);
        assert_eq!(ChangeType::SUBTREE_PROPS.bits(), 8);
        assert_eq!(ChangeType::GLOBAL_PROPS.bits(), 16);
        assert_eq!(ChangeType::ALWAYS.bits(), 63);
        assert_eq!(ChangeType::FORCE.bits(), 127);
        assert_eq!(ChangeType::CATEGORIES.bits(), 31);
    }

    #[test]
    fn prop_theme_truth_table() {
        let mask = ChangeType::PROP | ChangeType::THEME;
        assert!(should_recompute(mask, ChangeType::PROP, true));
        assert!(should_recompute(mask, ChangeType::THEME, true));
        assert!(!should_recompute(mask, ChangeType::LANG, true));
        assert!(should_recompute(mask, ChangeType::FORCE, true));
        assert!(should_recompute(mask, ChangeType::ALWAYS, true));
    }

    #[test]
    fn never_only_recomputes_on_force() {
        let mask = ChangeType::NEVER;
        assert!(!should_recompute(mask, ChangeType::PROP, true));
        assert!(!should_recompute(mask, ChangeType::ALWAYS, true));
        assert!(should_recompute(mask, ChangeType::FORCE, true));
    }

    #[test]
    fn missing_cache_always_computes() {
        assert!(should_recompute(ChangeType::NEVER, ChangeType::PROP, false));
        assert!(should_recompute(ChangeType::LANG, ChangeType::PROP, false));
    }

    #[test]
    fn bare_categories_expand_like_always() {
        // A caller that ORs the five categories by hand gets ALWAYS behavior.
        let incoming = ChangeType::CATEGORIES;
        assert_eq!(incoming.expanded(), ChangeType::ALWAYS);
        assert!(should_recompute(ChangeType::RESERVED, incoming, true));
    }

    #[test]
    fn merged_mask_matches_any_member() {
        let merged = ChangeType::LANG | ChangeType::GLOBAL_PROPS;
        assert!(should_recompute(ChangeType::GLOBAL_PROPS, merged, true));
        assert!(!should_recompute(ChangeType::THEME, merged, true));
    }
}
