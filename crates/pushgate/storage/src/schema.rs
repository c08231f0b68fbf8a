//! Diesel schema definitions.

diesel::table! {
    canonical_reg_ids (reg_id) {
        reg_id -> Text,
        canonical_reg_id -> Text,
    }
}
