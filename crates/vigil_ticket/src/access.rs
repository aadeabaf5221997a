//! Role checks and ticket channel overwrites.

use vigil_core::{MemberInfo, TicketConfig};
use vigil_interface::{ChannelPermissions, OverwriteTarget, PermissionOverwrite};

/// Support staff: administrators, support roles and admin roles.
pub fn is_staff(config: &TicketConfig, member: &MemberInfo) -> bool {
    *member.is_administrator()
        || member.has_any_role(&config.support_role_ids)
        || member.has_any_role(&config.admin_role_ids)
}

/// Ticket administrators: the administrator permission or an admin role.
pub fn is_admin(config: &TicketConfig, member: &MemberInfo) -> bool {
    *member.is_administrator() || member.has_any_role(&config.admin_role_ids)
}

/// Overwrites for a new ticket channel.
///
/// The default role loses read access. The bot and admin roles get full
/// control, support roles read and write. The creator gets read and write
/// unless the ticket is anonymous, in which case they get no entry at all.
pub fn ticket_overwrites(
    config: &TicketConfig,
    bot_id: u64,
    creator_id: u64,
    anonymous: bool,
) -> Vec<PermissionOverwrite> {
    let mut overwrites = vec![
        PermissionOverwrite::deny(OverwriteTarget::Everyone, ChannelPermissions::READ),
        PermissionOverwrite::allow(OverwriteTarget::Member(bot_id), ChannelPermissions::ALL),
    ];
    overwrites.extend(config.support_role_ids.iter().map(|role| {
        PermissionOverwrite::allow(OverwriteTarget::Role(*role), ChannelPermissions::READ_WRITE)
    }));
    overwrites.extend(
        config
            .admin_role_ids
            .iter()
            .map(|role| PermissionOverwrite::allow(OverwriteTarget::Role(*role), ChannelPermissions::ALL)),
    );
    if !anonymous {
        overwrites.push(PermissionOverwrite::allow(
            OverwriteTarget::Member(creator_id),
            ChannelPermissions::READ_WRITE,
        ));
    }
    overwrites
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TicketConfig {
        let mut config = TicketConfig::default();
        config.support_role_ids.insert(10);
        config.admin_role_ids.insert(20);
        config
    }

    #[test]
    fn test_staff_and_admin_roles() {
        let config = config();
        let support = MemberInfo::new(1, "s").with_role_ids([10].into());
        let admin = MemberInfo::new(2, "a").with_role_ids([20].into());
        let owner = MemberInfo::new(3, "o").with_is_administrator(true);
        let user = MemberInfo::new(4, "u");

        assert!(is_staff(&config, &support) && !is_admin(&config, &support));
        assert!(is_staff(&config, &admin) && is_admin(&config, &admin));
        assert!(is_staff(&config, &owner) && is_admin(&config, &owner));
        assert!(!is_staff(&config, &user));
    }

    #[test]
    fn test_anonymous_creator_has_no_entry() {
        let config = config();
        let named = ticket_overwrites(&config, 1, 42, false);
        let anonymous = ticket_overwrites(&config, 1, 42, true);

        assert!(named.iter().any(|o| o.target == OverwriteTarget::Member(42)));
        assert!(!anonymous.iter().any(|o| o.target == OverwriteTarget::Member(42)));
        assert_eq!(
            anonymous[0],
            PermissionOverwrite::deny(OverwriteTarget::Everyone, ChannelPermissions::READ)
        );
    }
}
