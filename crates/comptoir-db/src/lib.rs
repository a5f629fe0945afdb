//! # comptoir-db: Database Layer for Comptoir
//!
//! This crate provides database access for the Comptoir sale engine.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Comptoir Data Flow                               │
//! │                                                                         │
//! │  comptoir-engine (SaleProcessor, RefundProcessor, ...)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    comptoir-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (product.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ ProductRepo   │    │ 001_initial  │  │   │
//! │  │   │ WriteTx       │◄───│ SaleRepo      │    │ 002_indexes  │  │   │
//! │  │   │ single-writer │    │ CaisseRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   WAL mode, foreign keys on, busy_timeout as fallback          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, write-transaction handle, configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types and busy classification
//! - [`repository`] - Repository implementations (product, sale, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comptoir_db::{Database, DbConfig};
//!
//! // Create database with default config
//! let config = DbConfig::new("path/to/db.sqlite");
//! let db = Database::new(config).await?;
//!
//! // Multi-table writes go through a single write transaction
//! let mut wtx = db.begin_write().await?;
//! db.products().try_decrement_stock(wtx.conn(), &product_id, 2).await?;
//! wtx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, WriteTx};

// Repository re-exports for convenience
pub use repository::caisse::{CaisseRepository, SessionClose};
pub use repository::customer::CustomerRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::{LowStockItem, ProductRepository};
pub use repository::promotion::PromotionRepository;
pub use repository::sale::SaleRepository;
