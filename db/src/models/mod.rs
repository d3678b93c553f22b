pub mod attendance_record;
pub mod qr_session;
pub mod user;

pub use attendance_record::Entity as AttendanceRecord;
pub use qr_session::Entity as QrSession;
pub use user::Entity as User;
