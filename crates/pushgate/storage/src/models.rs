//! Database models.

use diesel::prelude::*;

use crate::schema::canonical_reg_ids;

/// Canonical registration ID record.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = canonical_reg_ids, primary_key(reg_id))]
pub struct CanonicalRegIdRow {
    pub reg_id: String,
    pub canonical_reg_id: String,
}

/// New canonical mapping for insertion.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = canonical_reg_ids)]
pub struct NewCanonicalRegId<'a> {
    pub reg_id: &'a str,
    pub canonical_reg_id: &'a str,
}
