use serenity::all::ChannelId;
use serenity::all::ChannelType;
use serenity::all::Mentionable;
use serenity::all::PartialChannel;
use serenity::all::UserId;

// given partial channel, either returns its id (if the channel kind is Text) or parent_id (if it's a text Thread)
// can be used to find a channel suitable for hosting a survey
pub fn surveyable_channel(pch: &PartialChannel) -> Option<ChannelId> {
    Some(match pch.kind {
        ChannelType::Text => pch.id,
        ChannelType::PrivateThread | ChannelType::PublicThread => match pch.parent_id {
            Some(id) => id,
            _ => return None,
        },
        _ => return None,
    })
}

// comma-separated mentions, or "None" when the list is empty
pub fn mention_list(users: &[UserId]) -> String {
    if users.is_empty() {
        return "None".to_string();
    }
    users.iter().map(|u| u.mention().to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_list_joins_or_falls_back() {
        assert_eq!(mention_list(&[]), "None");
        assert_eq!(mention_list(&[UserId::new(7)]), "<@7>");
        assert_eq!(mention_list(&[UserId::new(1), UserId::new(2)]), "<@1>, <@2>");
    }
}
