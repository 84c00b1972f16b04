pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod reference;
pub mod repository;
pub mod seat;
pub mod service;

pub use error::BookingError;
pub use ledger::{LedgerRules, SeatLedger};
pub use memory::InMemoryBookingRepository;
pub use models::{
    Booking, BookingStatus, CancelBookingRequest, CreateBookingRequest, Gender, PassengerDetails,
    PaymentStatus, SeatMap,
};
pub use repository::{BookingRepository, RepositoryError};
pub use service::BookingService;
