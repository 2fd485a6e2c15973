use std::time::Duration;
use std::time::Instant;

use serenity::all::ButtonStyle;
use serenity::all::CommandInteraction;
use serenity::all::ComponentInteractionCollector;
use serenity::all::Context;
use serenity::all::CreateActionRow;
use serenity::all::CreateButton;
use serenity::all::CreateInteractionResponse;
use serenity::all::CreateInteractionResponseFollowup;
use serenity::all::CreateInteractionResponseMessage;
use serenity::all::EditMessage;
use serenity::all::MessageBuilder;
use serenity::all::ResolvedValue;
use tracing::{error, info, warn};

use crate::poll::{DateRange, PollAggregator, Period, RankedSlot, TallyResult, TimeSlot};
use crate::utils::{mention_list, surveyable_channel};

// Discord allows 5 action rows per message and each survey day takes one row
// (date header + 3 slot buttons)
const MAX_SURVEY_DAYS: i64 = 5;

struct SurveyOptions {
    duration_mins: i64,
    date_range: String,
    title: String,
    description: String,
}

fn survey_options(cmd: &CommandInteraction) -> Option<SurveyOptions> {
    let mut duration_mins = None;
    let mut date_range = None;
    let mut title = None;
    let mut description = None;
    for opt in cmd.data.options() {
        match (opt.name, opt.value) {
            ("duration", ResolvedValue::Integer(v)) => duration_mins = Some(v),
            ("date_range", ResolvedValue::String(s)) => date_range = Some(s.to_string()),
            ("title", ResolvedValue::String(s)) => title = Some(s.to_string()),
            ("description", ResolvedValue::String(s)) => description = Some(s.to_string()),
            _ => {}
        }
    }
    Some(SurveyOptions {
        duration_mins: duration_mins?,
        date_range: date_range?,
        title: title?,
        description: description?,
    })
}

// one row per day: disabled date header followed by the three period buttons
fn slot_rows(range: &DateRange, disabled: bool) -> Vec<CreateActionRow> {
    range
        .dates()
        .map(|date| {
            let mut buttons = vec![CreateButton::new(format!("day:{date}"))
                .label(date.format("%Y-%m-%d (%A)").to_string())
                .style(ButtonStyle::Secondary)
                .disabled(true)];
            for period in Period::ALL {
                let slot = TimeSlot { date, period };
                buttons.push(
                    CreateButton::new(slot.custom_id())
                        .label(period.name())
                        .style(ButtonStyle::Primary)
                        .disabled(disabled),
                );
            }
            CreateActionRow::Buttons(buttons)
        })
        .collect()
}

fn ranked_line(ranked: Option<RankedSlot>, placeholder: &str) -> (String, usize) {
    match ranked {
        Some(r) => (r.slot.to_string(), r.count),
        None => (placeholder.to_string(), 0),
    }
}

// the final results message, pure so it can be tested without a gateway
fn format_results(result: &TallyResult) -> String {
    let (best, best_count) = ranked_line(result.best, "No times selected.");
    let (second, second_count) = ranked_line(result.second_best, "No second best time.");
    MessageBuilder::new()
        .push_line("Survey completed.")
        .push_line(format!("The best time slot is: {best} with {best_count} participants available."))
        .push_line(format!(
            "The second best time slot is: {second} with {second_count} participants available."
        ))
        .push_line("")
        .push_line(format!("Can attend the best time: {}", mention_list(&result.can_attend_best)))
        .push_line(format!(
            "Can attend the second best time: {}",
            mention_list(&result.can_attend_second_best)
        ))
        .push_line(format!(
            "Cannot attend the best time: {}",
            mention_list(&result.cannot_attend_best)
        ))
        .push_line(format!(
            "Cannot attend the second best time: {}",
            mention_list(&result.cannot_attend_second_best)
        ))
        .build()
}

// responds to the slash command with an ephemeral error instead of a poll
async fn reject(ctx: &Context, cmd: &CommandInteraction, text: String) -> Result<String, serenity::Error> {
    let resp_msg = CreateInteractionResponseMessage::new().content(&text).ephemeral(true);
    cmd.create_response(&ctx.http, CreateInteractionResponse::Message(resp_msg)).await?;
    Ok(text)
}

// runs one survey end to end: posts the slot grid, collects clicks until the
// window elapses, then tallies and posts the results to the channel
pub async fn run(ctx: &Context, cmd: &CommandInteraction) -> Result<String, serenity::Error> {
    let Some(opts) = survey_options(cmd) else {
        return reject(ctx, cmd, "Missing survey options. Aborted.".to_string()).await;
    };

    // checking if we're in a proper channel
    if cmd.channel.as_ref().and_then(surveyable_channel).is_none() {
        return reject(
            ctx,
            cmd,
            "Tried to start a survey outside a guild text channel. Aborted.".to_string(),
        )
        .await;
    }

    let range = match DateRange::parse(&opts.date_range) {
        Ok(range) => range,
        Err(e) => return reject(ctx, cmd, format!("{e}. Aborted.")).await,
    };
    if range.days() > MAX_SURVEY_DAYS {
        return reject(
            ctx,
            cmd,
            format!(
                "The range covers {} days, but a survey fits at most {MAX_SURVEY_DAYS}. Aborted.",
                range.days()
            ),
        )
        .await;
    }
    if opts.duration_mins < 1 {
        return reject(ctx, cmd, "The survey duration must be at least 1 minute. Aborted.".to_string())
            .await;
    }

    let poll = PollAggregator::new(range, Duration::from_secs(opts.duration_mins as u64 * 60));

    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await?;

    let intro = MessageBuilder::new()
        .push_bold_line_safe(&opts.title)
        .push_line_safe(&opts.description)
        .push_line("")
        .push_line(format!(
            "Select as many dates and times as you'd like. The survey will run for {} minutes.",
            opts.duration_mins
        ))
        .build();
    let followup = CreateInteractionResponseFollowup::new()
        .content(intro)
        .components(slot_rows(&range, false));
    let mut poll_msg = cmd.create_followup(&ctx.http, followup).await?;
    info!("survey {} open for {} minutes", poll_msg.id, opts.duration_mins);

    // collecting clicks until the window elapses
    let deadline = Instant::now() + poll.open_for();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let Some(click) = ComponentInteractionCollector::new(&ctx.shard)
            .message_id(poll_msg.id)
            .timeout(remaining)
            .await
        else {
            break;
        };
        let Some(slot) = TimeSlot::parse_custom_id(&click.data.custom_id) else {
            warn!("ignoring unknown component {}", click.data.custom_id);
            let _ = click.create_response(&ctx.http, CreateInteractionResponse::Acknowledge).await;
            continue;
        };
        let ack = match poll.record_selection(click.user.id, slot) {
            Some(selected) => {
                let times =
                    selected.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ");
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(format!("You've selected: {times}."))
                        .ephemeral(true),
                )
            }
            // late click, dropped
            None => CreateInteractionResponse::Acknowledge,
        };
        if let Err(why) = click.create_response(&ctx.http, ack).await {
            warn!("cannot acknowledge selection: {why}");
        }
    }

    let result = match poll.close_and_tally() {
        Ok(result) => result,
        Err(e) => return Ok(format!("Survey tally failed: {e}")),
    };

    // graying out the grid; the tally stands even if this edit fails
    let edit = EditMessage::new().components(slot_rows(&range, true));
    if let Err(why) = poll_msg.edit(&ctx, edit).await {
        warn!("cannot disable survey buttons: {why}");
    }

    // results go through the channel, not the interaction token, which expires
    // long before a survey-length window does
    if let Err(why) = poll_msg.channel_id.say(&ctx.http, format_results(&result)).await {
        error!("failed to send survey results: {why}");
    }

    Ok("Survey completed.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::UserId;

    fn slot(date: &str, period: Period) -> TimeSlot {
        TimeSlot { date: date.parse().unwrap(), period }
    }

    #[test]
    fn one_row_of_four_buttons_per_day() {
        let range = DateRange::parse("2024-01-01:2024-01-02").unwrap();
        let rows = slot_rows(&range, false);
        assert_eq!(rows.len(), 2);
        for row in rows {
            match row {
                CreateActionRow::Buttons(buttons) => assert_eq!(buttons.len(), 4),
                other => panic!("expected a button row, got {other:?}"),
            }
        }
    }

    #[test]
    fn results_message_names_winners_and_mentions() {
        let morning = slot("2024-01-01", Period::Morning);
        let evening = slot("2024-01-01", Period::Evening);
        let result = TallyResult {
            ranked: vec![
                RankedSlot { slot: morning, count: 2 },
                RankedSlot { slot: evening, count: 1 },
            ],
            best: Some(RankedSlot { slot: morning, count: 2 }),
            second_best: Some(RankedSlot { slot: evening, count: 1 }),
            can_attend_best: vec![UserId::new(1), UserId::new(2)],
            cannot_attend_best: vec![],
            can_attend_second_best: vec![UserId::new(1)],
            cannot_attend_second_best: vec![UserId::new(2)],
        };
        let text = format_results(&result);
        assert!(text.contains(
            "The best time slot is: 2024-01-01 (Monday) Morning with 2 participants available."
        ));
        assert!(text.contains(
            "The second best time slot is: 2024-01-01 (Monday) Evening with 1 participants available."
        ));
        assert!(text.contains("Can attend the best time: <@1>, <@2>"));
        assert!(text.contains("Cannot attend the best time: None"));
        assert!(text.contains("Can attend the second best time: <@1>"));
        assert!(text.contains("Cannot attend the second best time: <@2>"));
    }

    #[test]
    fn results_message_for_an_empty_poll() {
        let result = TallyResult {
            ranked: vec![],
            best: None,
            second_best: None,
            can_attend_best: vec![],
            cannot_attend_best: vec![],
            can_attend_second_best: vec![],
            cannot_attend_second_best: vec![],
        };
        let text = format_results(&result);
        assert!(text.contains("The best time slot is: No times selected. with 0 participants available."));
        assert!(text.contains("The second best time slot is: No second best time. with 0 participants available."));
        assert!(text.contains("Can attend the best time: None"));
    }
}
