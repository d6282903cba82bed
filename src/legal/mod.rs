//! Static legal pages linked from the callback pages

mod router;

pub use router::create_legal_router;
