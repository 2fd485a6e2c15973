use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;

pub fn register() -> CreateCommand {
    CreateCommand::new("schedule_survey")
        .description("Start a survey to schedule an event.")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "duration",
                "Duration of the survey in minutes",
            )
            .min_int_value(1)
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "date_range",
                "Date range for the survey formatted as YYYY-MM-DD:YYYY-MM-DD",
            )
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "title", "Title of the survey")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "description",
                "Description of the survey",
            )
            .required(true),
        )
}
