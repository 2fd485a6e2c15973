pub mod schedule_survey;
