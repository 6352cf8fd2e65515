use crate::models::region::Side;

/// Opponent input scheme shown on the versus screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlScheme {
    Classic,
    Modern,
}

impl ControlScheme {
    pub const ALL: [ControlScheme; 2] = [ControlScheme::Classic, ControlScheme::Modern];

    /// Label doubles as the template file stem and the cue file stem.
    pub fn label(self) -> &'static str {
        match self {
            ControlScheme::Classic => "Classic",
            ControlScheme::Modern => "Modern",
        }
    }
}

/// League rank badge shown next to the fighter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    NewChallenger,
    Rookie,
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    HighMaster,
    GrandMaster,
    UltimateMaster,
    Legend,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::NewChallenger,
        Rank::Rookie,
        Rank::Iron,
        Rank::Bronze,
        Rank::Silver,
        Rank::Gold,
        Rank::Platinum,
        Rank::Diamond,
        Rank::Master,
        Rank::HighMaster,
        Rank::GrandMaster,
        Rank::UltimateMaster,
        Rank::Legend,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rank::NewChallenger => "NewChallenger",
            Rank::Rookie => "Rookie",
            Rank::Iron => "Iron",
            Rank::Bronze => "Bronze",
            Rank::Silver => "Silver",
            Rank::Gold => "Gold",
            Rank::Platinum => "Platinum",
            Rank::Diamond => "Diamond",
            Rank::Master => "Master",
            Rank::HighMaster => "HighMaster",
            Rank::GrandMaster => "GrandMaster",
            Rank::UltimateMaster => "UltimateMaster",
            Rank::Legend => "Legend",
        }
    }

    /// Ranks that carry a One..Five division badge below the main badge.
    pub fn has_divisions(self) -> bool {
        matches!(
            self,
            Rank::Rookie
                | Rank::Iron
                | Rank::Bronze
                | Rank::Silver
                | Rank::Gold
                | Rank::Platinum
                | Rank::Diamond
        )
    }

    /// Only the base Master rank shows a Master Rating figure. The named
    /// master tiers above it do not.
    pub fn shows_master_rating(self) -> bool {
        self == Rank::Master
    }
}

/// Division within a divisioned rank, highest number first on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Division {
    pub const ALL: [Division; 5] = [
        Division::One,
        Division::Two,
        Division::Three,
        Division::Four,
        Division::Five,
    ];

    /// Cue file naming uses the capitalized form, e.g. "GoldTwo.ogg".
    pub fn label(self) -> &'static str {
        match self {
            Division::One => "One",
            Division::Two => "Two",
            Division::Three => "Three",
            Division::Four => "Four",
            Division::Five => "Five",
        }
    }

    /// Template images on disk are lowercase, e.g. "two.png".
    pub fn template_stem(self) -> &'static str {
        match self {
            Division::One => "one",
            Division::Two => "two",
            Division::Three => "three",
            Division::Four => "four",
            Division::Five => "five",
        }
    }
}

/// Master Rating bracket, rounded down to the nearest hundred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MrBracket {
    Mr1000,
    Mr1100,
    Mr1200,
    Mr1300,
    Mr1400,
    Mr1500,
}

impl MrBracket {
    pub const ALL: [MrBracket; 6] = [
        MrBracket::Mr1000,
        MrBracket::Mr1100,
        MrBracket::Mr1200,
        MrBracket::Mr1300,
        MrBracket::Mr1400,
        MrBracket::Mr1500,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MrBracket::Mr1000 => "1000",
            MrBracket::Mr1100 => "1100",
            MrBracket::Mr1200 => "1200",
            MrBracket::Mr1300 => "1300",
            MrBracket::Mr1400 => "1400",
            MrBracket::Mr1500 => "1500",
        }
    }
}

/// Classified color of a health bar sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthColor {
    Red,
    Yellow,
    Blue,
}

impl HealthColor {
    /// Normal bar color for a side: red for player one, blue for player two.
    pub fn base_for(side: Side) -> HealthColor {
        match side {
            Side::Left => HealthColor::Red,
            Side::Right => HealthColor::Blue,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HealthColor::Red => "red",
            HealthColor::Yellow => "yellow",
            HealthColor::Blue => "blue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_labels_match_template_stems() {
        assert_eq!(Rank::NewChallenger.label(), "NewChallenger");
        assert_eq!(Rank::UltimateMaster.label(), "UltimateMaster");
        assert_eq!(Rank::ALL.len(), 13);
    }

    #[test]
    fn test_divisioned_ranks() {
        assert!(Rank::Rookie.has_divisions());
        assert!(Rank::Diamond.has_divisions());
        assert!(!Rank::NewChallenger.has_divisions());
        assert!(!Rank::Master.has_divisions());
        assert!(!Rank::Legend.has_divisions());
    }

    #[test]
    fn test_only_base_master_shows_rating() {
        assert!(Rank::Master.shows_master_rating());
        assert!(!Rank::HighMaster.shows_master_rating());
        assert!(!Rank::GrandMaster.shows_master_rating());
        assert!(!Rank::UltimateMaster.shows_master_rating());
        assert!(!Rank::Legend.shows_master_rating());
    }

    #[test]
    fn test_division_stems_are_lowercase() {
        assert_eq!(Division::Two.label(), "Two");
        assert_eq!(Division::Two.template_stem(), "two");
        assert_eq!(Division::Five.template_stem(), "five");
    }

    #[test]
    fn test_mr_bracket_labels() {
        let labels: Vec<&str> = MrBracket::ALL.iter().map(|b| b.label()).collect();
        assert_eq!(labels, ["1000", "1100", "1200", "1300", "1400", "1500"]);
    }

    #[test]
    fn test_base_health_colors() {
        assert_eq!(HealthColor::base_for(Side::Left), HealthColor::Red);
        assert_eq!(HealthColor::base_for(Side::Right), HealthColor::Blue);
    }
}
