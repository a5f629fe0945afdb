//! # Repository Module
//!
//! Database repository implementations for the Comptoir engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine Orchestrator                                                   │
//! │       │                                                                 │
//! │       │  db.products().try_decrement_stock(wtx.conn(), id, 3)          │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id(&self, id)              ← pool read                     │
//! │  ├── try_decrement_stock(conn, id, n)  ← transactional write           │
//! │  └── ...                                                                │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds of Methods
//! - Pool reads take `&self` and run on any pool connection.
//! - Write methods (and reads that must see in-flight writes) take
//!   `conn: &mut SqliteConnection` so several of them compose into one
//!   transaction. Callers pass `wtx.conn()` from [`crate::pool::WriteTx`].
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Products and inventory counters
//! - [`movement::MovementRepository`] - Stock movement ledger
//! - [`sale::SaleRepository`] - Sales, items, refunds, sale numbers
//! - [`promotion::PromotionRepository`] - Promotions and usage counts
//! - [`customer::CustomerRepository`] - Customers and loyalty balances
//! - [`caisse::CaisseRepository`] - Caisse sessions

pub mod caisse;
pub mod customer;
pub mod movement;
pub mod product;
pub mod promotion;
pub mod sale;
