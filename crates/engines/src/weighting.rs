//! Interaction weighting.
//!
//! Converts raw events into numeric affinity scores:
//! weight(interaction_type) * (rating or 3.0) / 3.0. A purchase with no
//! rating scores 5.0; a 5-star review scores 4.0 * 5/3 = 6.67. Unknown
//! event types count like plain views.

use store::{Interaction, InteractionType};

const DEFAULT_RATING: f32 = 3.0;

/// Base affinity weight for an interaction type.
pub fn interaction_weight(kind: InteractionType) -> f32 {
    match kind {
        InteractionType::View => 1.0,
        InteractionType::Click => 1.5,
        InteractionType::AddToCart => 3.0,
        InteractionType::Wishlist => 2.5,
        InteractionType::Review => 4.0,
        InteractionType::Purchase => 5.0,
        InteractionType::Other => 1.0,
    }
}

/// Scalar affinity value for a single interaction.
pub fn weighted_value(interaction: &Interaction) -> f32 {
    let rating = interaction.rating.unwrap_or(DEFAULT_RATING);
    interaction_weight(interaction.interaction_type) * (rating / DEFAULT_RATING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store::Interaction;

    #[test]
    fn test_weight_table() {
        assert_eq!(interaction_weight(InteractionType::View), 1.0);
        assert_eq!(interaction_weight(InteractionType::Click), 1.5);
        assert_eq!(interaction_weight(InteractionType::AddToCart), 3.0);
        assert_eq!(interaction_weight(InteractionType::Wishlist), 2.5);
        assert_eq!(interaction_weight(InteractionType::Review), 4.0);
        assert_eq!(interaction_weight(InteractionType::Purchase), 5.0);
        assert_eq!(interaction_weight(InteractionType::Other), 1.0);
    }

    #[test]
    fn test_missing_rating_defaults_to_neutral() {
        let view = Interaction::new("u1", "p1", InteractionType::View, Utc::now());
        assert!((weighted_value(&view) - 1.0).abs() < f32::EPSILON);

        let purchase = Interaction::new("u1", "p1", InteractionType::Purchase, Utc::now());
        assert!((weighted_value(&purchase) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_rating_scales_weight() {
        let review = Interaction::new("u1", "p1", InteractionType::Review, Utc::now())
            .with_rating(4.5);
        // 4.0 * 4.5 / 3.0 = 6.0
        assert!((weighted_value(&review) - 6.0).abs() < 1e-6);

        let low = Interaction::new("u1", "p1", InteractionType::Purchase, Utc::now())
            .with_rating(1.0);
        // 5.0 * 1/3
        assert!((weighted_value(&low) - 5.0 / 3.0).abs() < 1e-6);
    }
}
