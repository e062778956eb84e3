pub mod sqlite_service_program_repository;
pub mod sqlite_service_reminder_repository;
pub mod sqlite_service_schedule_repository;
pub mod sqlite_service_task_repository;
pub mod sqlite_vehicle_repository;

pub use sqlite_service_program_repository::SqliteServiceProgramRepository;
pub use sqlite_service_reminder_repository::SqliteServiceReminderRepository;
pub use sqlite_service_schedule_repository::SqliteServiceScheduleRepository;
pub use sqlite_service_task_repository::SqliteServiceTaskRepository;
pub use sqlite_vehicle_repository::SqliteVehicleRepository;
