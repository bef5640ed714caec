//! Stock-tracked SKU options.

use common::{ProductId, SkuOptionId};
use serde::{Deserialize, Serialize};

use crate::lens::Diopter;

/// A stock-tracked variant of a product (e.g., one lens power combination).
///
/// Order lines do not hold a foreign key to an option; they are re-matched
/// against the catalog by `(product_id, sph, cyl)` on every transition, so a
/// line may match a different option (or none) than it would have at order
/// time if the catalog changed in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuOption {
    /// Unique option identifier.
    pub id: SkuOptionId,

    /// The product this option belongs to.
    pub product_id: ProductId,

    /// Sphere power identifying this option. Immutable after creation.
    pub sph: Option<Diopter>,

    /// Cylinder power identifying this option. Immutable after creation.
    pub cyl: Option<Diopter>,

    /// Units on hand. Never negative; written only by the stock ledger
    /// inside a fulfillment transaction.
    pub stock: i64,

    /// Inactive options are excluded from matching.
    pub active: bool,
}

impl SkuOption {
    /// Creates a new active option with the given starting stock.
    pub fn new(
        product_id: impl Into<ProductId>,
        sph: Option<Diopter>,
        cyl: Option<Diopter>,
        stock: i64,
    ) -> Self {
        Self {
            id: SkuOptionId::new(),
            product_id: product_id.into(),
            sph,
            cyl,
            stock,
            active: true,
        }
    }

    /// Returns true if this option matches a line's identifying attributes.
    pub fn matches(&self, product_id: &ProductId, sph: Option<Diopter>, cyl: Option<Diopter>) -> bool {
        self.active && &self.product_id == product_id && self.sph == sph && self.cyl == cyl
    }
}
