//! Resolution of caller-supplied guild and user references to plain ids.
//!
//! Callers hand the shop whatever they have at hand: a raw snowflake, or a
//! chat platform object that carries the guild or user somewhere inside it.
//! The platform objects are modelled here as the minimal shapes the shop
//! reads ids from; adapters convert their own types into these.

/// A guild (tenant) as seen by the shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: String,
}

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub guild: Guild,
    pub user: User,
}

/// A command or component interaction issued inside a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub guild: Guild,
    pub user: User,
}

/// A message posted in a guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub guild: Guild,
    pub author: User,
}

/// Anything a guild id can be read from.
#[derive(Debug, Clone, Copy)]
pub enum GuildRef<'a> {
    Id(&'a str),
    Guild(&'a Guild),
    Interaction(&'a Interaction),
    Member(&'a Member),
    Message(&'a Message),
}

impl GuildRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Guild(guild) => &guild.id,
            Self::Interaction(interaction) => &interaction.guild.id,
            Self::Member(member) => &member.guild.id,
            Self::Message(message) => &message.guild.id,
        }
    }
}

/// Anything a user id can be read from.
#[derive(Debug, Clone, Copy)]
pub enum UserRef<'a> {
    Id(&'a str),
    User(&'a User),
    Interaction(&'a Interaction),
    Member(&'a Member),
    Message(&'a Message),
}

impl UserRef<'_> {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::User(user) => &user.id,
            Self::Interaction(interaction) => &interaction.user.id,
            Self::Member(member) => &member.user.id,
            Self::Message(message) => &message.author.id,
        }
    }
}

/// Canonical id of a guild reference.
pub fn resolve_guild<'a>(guild: impl Into<GuildRef<'a>>) -> String {
    guild.into().id().to_owned()
}

/// Canonical id of a user reference.
pub fn resolve_user<'a>(user: impl Into<UserRef<'a>>) -> String {
    user.into().id().to_owned()
}

macro_rules! impl_from {
    ($target:ident: $($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl<'a> From<&'a $source> for $target<'a> {
                fn from(value: &'a $source) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

impl_from!(GuildRef: Guild => Guild, Interaction => Interaction, Member => Member, Message => Message);
impl_from!(UserRef: User => User, Interaction => Interaction, Member => Member, Message => Message);

impl<'a> From<&'a str> for GuildRef<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a String> for GuildRef<'a> {
    fn from(id: &'a String) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for UserRef<'a> {
    fn from(id: &'a str) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a String> for UserRef<'a> {
    fn from(id: &'a String) -> Self {
        Self::Id(id)
    }
}

// ── tests ────────────────────────────────────────────────────────────
