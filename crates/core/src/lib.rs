pub mod cart;
pub mod config;
pub mod errors;
pub mod lead;

pub use cart::{CartItem, CartProduct, CartStorage, CartStore, InMemoryStorage, JsonFileStorage};
pub use config::{AppConfig, LoadOptions, TransportMode};
pub use errors::FieldErrors;
pub use lead::{
    build_payload, render_message, validate_contact, ContactForm, ContactInfo, LeadCartItem,
    LeadPayload, PageContext,
};
