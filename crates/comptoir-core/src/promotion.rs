//! # Promotion Evaluator
//!
//! Pure cart-against-promotions evaluation. No clock, no storage: the
//! caller supplies the cart lines, the candidate promotions with their
//! product scopes, and today's date, and gets back the discounts that
//! apply.
//!
//! ## Evaluation Pipeline
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  CartLine[] │────▶│  per promotion:  │────▶│  select_stacked  │
//! │  (qty,price)│     │   gate checks    │     │  All | BestOnly  │
//! └─────────────┘     │   scope filter   │     └──────────────────┘
//! ┌─────────────┐     │   discount calc  │              │
//! │ Promotions  │────▶│                  │              ▼
//! │ + scopes    │     └──────────────────┘     AppliedPromotion[]
//! └─────────────┘
//! ```
//!
//! ## Gates (all must pass)
//! 1. `is_active` flag
//! 2. calendar window: `starts_on <= today <= ends_on` (both inclusive)
//! 3. usage cap: `current_uses < max_uses` when a cap is set
//! 4. scoped quantity: `Σ qty >= min_quantity` when set
//! 5. scoped subtotal: `Σ qty × unit price >= min_purchase_cents` when set
//!
//! ## Discount Rules
//! - `percentage`: `value` bps of the scoped gross subtotal, rounded
//!   half-up
//! - `fixed`: `value` cents, applied once regardless of quantity
//! - `buy_x_get_y`: `floor(scoped qty / min_quantity) × value` free
//!   units (capped at scoped qty), each priced at the cheapest scoped
//!   unit price
//!
//! Scoped subtotals are gross: per-line discounts are ignored here and
//! subtracted separately by the sale totals math.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Promotion, PromotionKind};

// =============================================================================
// Input / Output Types
// =============================================================================

/// One cart line as the evaluator sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl CartLine {
    /// Gross line total, before any per-line discount.
    #[inline]
    pub fn gross_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// A promotion definition together with its product scope.
///
/// An empty `product_ids` means the promotion is store-wide and every
/// cart line is in scope.
#[derive(Debug, Clone)]
pub struct ActivePromotion {
    pub promotion: Promotion,
    pub product_ids: Vec<String>,
}

impl ActivePromotion {
    fn is_in_scope(&self, product_id: &str) -> bool {
        self.product_ids.is_empty() || self.product_ids.iter().any(|p| p == product_id)
    }
}

/// The outcome of one promotion applying to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: String,
    /// Name frozen at evaluation time, persisted with the sale.
    pub name: String,
    pub discount_cents: i64,
    /// Product ids of the cart lines the discount was computed over,
    /// in cart order.
    pub covered_lines: Vec<String>,
}

/// How multiple eligible promotions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingPolicy {
    /// Every eligible promotion applies; discounts sum.
    All,
    /// Only the single largest discount applies. Ties keep the first
    /// in evaluation order.
    BestOnly,
}

impl Default for StackingPolicy {
    fn default() -> Self {
        StackingPolicy::All
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Evaluates every candidate promotion against the cart.
///
/// Returns one `AppliedPromotion` per promotion that passes all gates
/// and produces a non-zero discount, in the order the candidates were
/// supplied. Stacking policy is applied afterwards by
/// [`select_stacked`].
pub fn evaluate(
    lines: &[CartLine],
    promotions: &[ActivePromotion],
    today: NaiveDate,
) -> Vec<AppliedPromotion> {
    promotions
        .iter()
        .filter_map(|candidate| evaluate_one(lines, candidate, today))
        .collect()
}

/// Applies the stacking policy to the evaluated promotions.
pub fn select_stacked(
    policy: StackingPolicy,
    mut applied: Vec<AppliedPromotion>,
) -> Vec<AppliedPromotion> {
    match policy {
        StackingPolicy::All => applied,
        StackingPolicy::BestOnly => {
            // First in evaluation order wins a tie.
            let mut best: Option<usize> = None;
            for (i, a) in applied.iter().enumerate() {
                let beats = match best {
                    None => true,
                    Some(b) => a.discount_cents > applied[b].discount_cents,
                };
                if beats {
                    best = Some(i);
                }
            }
            match best {
                Some(i) => vec![applied.swap_remove(i)],
                None => Vec::new(),
            }
        }
    }
}

/// Total discount across the selected promotions.
pub fn total_discount_cents(applied: &[AppliedPromotion]) -> i64 {
    applied.iter().map(|a| a.discount_cents).sum()
}

fn evaluate_one(
    lines: &[CartLine],
    candidate: &ActivePromotion,
    today: NaiveDate,
) -> Option<AppliedPromotion> {
    let promo = &candidate.promotion;

    if !promo.is_active {
        return None;
    }
    if today < promo.starts_on || today > promo.ends_on {
        return None;
    }
    if let Some(cap) = promo.max_uses {
        if promo.current_uses >= cap {
            return None;
        }
    }

    let scoped: Vec<&CartLine> = lines
        .iter()
        .filter(|l| candidate.is_in_scope(&l.product_id))
        .collect();
    if scoped.is_empty() {
        return None;
    }

    let scoped_qty: i64 = scoped.iter().map(|l| l.quantity).sum();
    let scoped_subtotal: i64 = scoped.iter().map(|l| l.gross_cents()).sum();

    if let Some(min_qty) = promo.min_quantity {
        if scoped_qty < min_qty {
            return None;
        }
    }
    if let Some(min_purchase) = promo.min_purchase_cents {
        if scoped_subtotal < min_purchase {
            return None;
        }
    }

    let discount_cents = match promo.kind {
        PromotionKind::Percentage => percentage_discount(scoped_subtotal, promo.value),
        PromotionKind::Fixed => promo.value,
        PromotionKind::BuyXGetY => buy_x_get_y_discount(&scoped, scoped_qty, promo),
    };

    if discount_cents <= 0 {
        return None;
    }

    Some(AppliedPromotion {
        promotion_id: promo.id.clone(),
        name: promo.name.clone(),
        discount_cents,
        covered_lines: scoped.iter().map(|l| l.product_id.clone()).collect(),
    })
}

/// `value` is basis points. Rounds half-up, matching the money layer.
fn percentage_discount(subtotal_cents: i64, value_bps: i64) -> i64 {
    let raw = subtotal_cents as i128 * value_bps as i128;
    ((raw + 5_000) / 10_000) as i64
}

/// Free units priced at the cheapest scoped unit price.
fn buy_x_get_y_discount(scoped: &[&CartLine], scoped_qty: i64, promo: &Promotion) -> i64 {
    let min_qty = match promo.min_quantity {
        Some(q) if q > 0 => q,
        _ => return 0,
    };
    let free_units = (scoped_qty / min_qty) * promo.value;
    let free_units = free_units.min(scoped_qty);
    if free_units <= 0 {
        return 0;
    }
    let cheapest = scoped
        .iter()
        .map(|l| l.unit_price_cents)
        .min()
        .unwrap_or(0);
    free_units * cheapest
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn promo(id: &str, kind: PromotionKind, value: i64) -> Promotion {
        let now = Utc::now();
        Promotion {
            id: id.to_string(),
            name: format!("promo {id}"),
            kind,
            value,
            min_quantity: None,
            min_purchase_cents: None,
            max_uses: None,
            current_uses: 0,
            starts_on: date(2026, 1, 1),
            ends_on: date(2026, 12, 31),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(product_id: &str, quantity: i64, unit_price_cents: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price_cents,
        }
    }

    fn store_wide(promotion: Promotion) -> ActivePromotion {
        ActivePromotion {
            promotion,
            product_ids: Vec::new(),
        }
    }

    fn scoped(promotion: Promotion, ids: &[&str]) -> ActivePromotion {
        ActivePromotion {
            promotion,
            product_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    const TODAY: fn() -> NaiveDate = || date(2026, 6, 15);

    #[test]
    fn test_percentage_of_scoped_subtotal() {
        // 10% of 30.00 = 3.00
        let lines = vec![line("a", 3, 1000)];
        let promos = vec![store_wide(promo("p1", PromotionKind::Percentage, 1000))];
        let applied = evaluate(&lines, &promos, TODAY());
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].discount_cents, 300);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 8.25% of 9.99 = 82.4175 cents -> 82
        let lines = vec![line("a", 1, 999)];
        let promos = vec![store_wide(promo("p1", PromotionKind::Percentage, 825))];
        assert_eq!(evaluate(&lines, &promos, TODAY())[0].discount_cents, 82);

        // 50% of 0.25 = 12.5 cents -> 13
        let lines = vec![line("a", 1, 25)];
        let promos = vec![store_wide(promo("p1", PromotionKind::Percentage, 5000))];
        assert_eq!(evaluate(&lines, &promos, TODAY())[0].discount_cents, 13);
    }

    #[test]
    fn test_fixed_applies_once_regardless_of_quantity() {
        let lines = vec![line("a", 7, 1000)];
        let promos = vec![store_wide(promo("p1", PromotionKind::Fixed, 500))];
        let applied = evaluate(&lines, &promos, TODAY());
        assert_eq!(applied[0].discount_cents, 500);
    }

    #[test]
    fn test_buy_two_get_one_free() {
        // 3 units at 4.00: one free unit.
        let mut p = promo("p1", PromotionKind::BuyXGetY, 1);
        p.min_quantity = Some(2);
        let lines = vec![line("a", 3, 400)];
        let applied = evaluate(&lines, &[store_wide(p)], TODAY());
        assert_eq!(applied[0].discount_cents, 400);
    }

    #[test]
    fn test_buy_x_get_y_multiples_and_cheapest_price() {
        // Scope has 6 units across two lines; buy 2 get 1 yields 3 free
        // units at the cheaper price (2.50).
        let mut p = promo("p1", PromotionKind::BuyXGetY, 1);
        p.min_quantity = Some(2);
        let lines = vec![line("a", 4, 400), line("b", 2, 250)];
        let applied = evaluate(&lines, &[store_wide(p)], TODAY());
        assert_eq!(applied[0].discount_cents, 3 * 250);
    }

    #[test]
    fn test_buy_x_get_y_below_threshold() {
        let mut p = promo("p1", PromotionKind::BuyXGetY, 1);
        p.min_quantity = Some(3);
        let lines = vec![line("a", 2, 400)];
        assert!(evaluate(&lines, &[store_wide(p)], TODAY()).is_empty());
    }

    #[test]
    fn test_scope_filters_lines() {
        // Promotion scoped to product b only sees b's subtotal.
        let p = promo("p1", PromotionKind::Percentage, 1000);
        let lines = vec![line("a", 1, 10_000), line("b", 2, 500)];
        let applied = evaluate(&lines, &[scoped(p, &["b"])], TODAY());
        assert_eq!(applied[0].discount_cents, 100); // 10% of 10.00
    }

    #[test]
    fn test_scope_miss_is_not_eligible() {
        let p = promo("p1", PromotionKind::Percentage, 1000);
        let lines = vec![line("a", 1, 10_000)];
        assert!(evaluate(&lines, &[scoped(p, &["zzz"])], TODAY()).is_empty());
    }

    #[test]
    fn test_covered_lines_follow_scope() {
        let p = promo("p1", PromotionKind::Percentage, 1000);
        let lines = vec![line("a", 1, 1000), line("b", 1, 1000)];

        let applied = evaluate(&lines, &[store_wide(p.clone())], TODAY());
        assert_eq!(applied[0].covered_lines, vec!["a", "b"]);

        let applied = evaluate(&lines, &[scoped(p, &["b"])], TODAY());
        assert_eq!(applied[0].covered_lines, vec!["b"]);
    }

    #[test]
    fn test_calendar_window_is_inclusive() {
        let mut p = promo("p1", PromotionKind::Fixed, 100);
        p.starts_on = date(2026, 6, 15);
        p.ends_on = date(2026, 6, 15);
        let lines = vec![line("a", 1, 1000)];

        assert_eq!(evaluate(&lines, &[store_wide(p.clone())], date(2026, 6, 15)).len(), 1);
        assert!(evaluate(&lines, &[store_wide(p.clone())], date(2026, 6, 14)).is_empty());
        assert!(evaluate(&lines, &[store_wide(p)], date(2026, 6, 16)).is_empty());
    }

    #[test]
    fn test_inactive_promotion_skipped() {
        let mut p = promo("p1", PromotionKind::Fixed, 100);
        p.is_active = false;
        let lines = vec![line("a", 1, 1000)];
        assert!(evaluate(&lines, &[store_wide(p)], TODAY()).is_empty());
    }

    #[test]
    fn test_usage_cap_exhausted() {
        let mut p = promo("p1", PromotionKind::Fixed, 100);
        p.max_uses = Some(10);
        p.current_uses = 10;
        let lines = vec![line("a", 1, 1000)];
        assert!(evaluate(&lines, &[store_wide(p.clone())], TODAY()).is_empty());

        p.current_uses = 9;
        assert_eq!(evaluate(&lines, &[store_wide(p)], TODAY()).len(), 1);
    }

    #[test]
    fn test_min_purchase_gate() {
        let mut p = promo("p1", PromotionKind::Percentage, 500);
        p.min_purchase_cents = Some(5000);
        let under = vec![line("a", 1, 4999)];
        let exact = vec![line("a", 1, 5000)];
        assert!(evaluate(&under, &[store_wide(p.clone())], TODAY()).is_empty());
        assert_eq!(evaluate(&exact, &[store_wide(p)], TODAY()).len(), 1);
    }

    #[test]
    fn test_min_quantity_counts_across_scoped_lines() {
        let mut p = promo("p1", PromotionKind::Fixed, 100);
        p.min_quantity = Some(4);
        let lines = vec![line("a", 2, 1000), line("b", 2, 1000)];
        assert_eq!(evaluate(&lines, &[store_wide(p)], TODAY()).len(), 1);
    }

    #[test]
    fn test_stacking_all_keeps_every_discount() {
        let lines = vec![line("a", 2, 1000)];
        let promos = vec![
            store_wide(promo("p1", PromotionKind::Percentage, 1000)),
            store_wide(promo("p2", PromotionKind::Fixed, 150)),
        ];
        let applied = evaluate(&lines, &promos, TODAY());
        let selected = select_stacked(StackingPolicy::All, applied);
        assert_eq!(selected.len(), 2);
        assert_eq!(total_discount_cents(&selected), 200 + 150);
    }

    #[test]
    fn test_stacking_best_only_picks_largest() {
        let lines = vec![line("a", 2, 1000)];
        let promos = vec![
            store_wide(promo("p1", PromotionKind::Fixed, 150)),
            store_wide(promo("p2", PromotionKind::Percentage, 1000)), // 200
        ];
        let applied = evaluate(&lines, &promos, TODAY());
        let selected = select_stacked(StackingPolicy::BestOnly, applied);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].promotion_id, "p2");
    }

    #[test]
    fn test_stacking_best_only_tie_keeps_first() {
        let lines = vec![line("a", 1, 1000)];
        let promos = vec![
            store_wide(promo("p1", PromotionKind::Fixed, 150)),
            store_wide(promo("p2", PromotionKind::Fixed, 150)),
        ];
        let applied = evaluate(&lines, &promos, TODAY());
        let selected = select_stacked(StackingPolicy::BestOnly, applied);
        assert_eq!(selected[0].promotion_id, "p1");
    }

    #[test]
    fn test_empty_inputs() {
        let lines = vec![line("a", 1, 1000)];
        assert!(evaluate(&[], &[store_wide(promo("p1", PromotionKind::Fixed, 100))], TODAY())
            .is_empty());
        assert!(evaluate(&lines, &[], TODAY()).is_empty());
        assert!(select_stacked(StackingPolicy::BestOnly, Vec::new()).is_empty());
    }

    #[test]
    fn test_zero_discount_not_applied() {
        // 1% of 0.30 rounds to 0 cents? 0.3 cents -> rounds to 0.
        let lines = vec![line("a", 1, 30)];
        let promos = vec![store_wide(promo("p1", PromotionKind::Percentage, 100))];
        assert!(evaluate(&lines, &promos, TODAY()).is_empty());
    }
}
