//! [`Catalog`] – the ordered exhibit list of one museum.
//!
//! Catalog order is significant: position `i` of an occupancy string refers
//! to the `i`-th exhibit here.  The catalog also owns the per-session
//! `visited` flags.
//!
//! # Example
//!
//! ```rust
//! use docent_runtime::catalog::Catalog;
//!
//! let catalog = Catalog::museum_default();
//! assert_eq!(catalog.ids(), vec![84, 80]);
//! assert_eq!(catalog.index_of(80), Some(1));
//! ```

use std::collections::HashSet;

use docent_types::{Exhibit, Pose, TourError};

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    exhibits: Vec<Exhibit>,
}

impl Catalog {
    /// Build a catalog from exhibits in occupancy order.
    ///
    /// # Errors
    ///
    /// [`TourError::InvalidExhibit`] if the list is empty or an id repeats.
    pub fn new(exhibits: Vec<Exhibit>) -> Result<Self, TourError> {
        if exhibits.is_empty() {
            return Err(TourError::InvalidExhibit(
                "catalog needs at least one exhibit".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for e in &exhibits {
            if !seen.insert(e.id) {
                return Err(TourError::InvalidExhibit(format!(
                    "exhibit id {} appears twice in the catalog",
                    e.id
                )));
            }
        }
        Ok(Self { exhibits })
    }

    /// The two-painting gallery the robot ships with: Monet's *Water Lilies*
    /// (marker 84) followed by Van Gogh's *The Starry Night* (marker 80).
    pub fn museum_default() -> Self {
        Self {
            exhibits: vec![water_lilies(), starry_night()],
        }
    }

    /// Position of `id` in occupancy order.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.exhibits.iter().position(|e| e.id == id)
    }

    pub fn get(&self, id: u32) -> Option<&Exhibit> {
        self.exhibits.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.exhibits.iter().map(|e| e.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exhibit> {
        self.exhibits.iter()
    }

    pub fn len(&self) -> usize {
        self.exhibits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exhibits.is_empty()
    }

    /// Flag `id` as visited.  Returns `true` only the first time.
    pub fn mark_visited(&mut self, id: u32) -> bool {
        match self.exhibits.iter_mut().find(|e| e.id == id) {
            Some(e) if !e.visited => {
                e.visited = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_visited(&self, id: u32) -> bool {
        self.get(id).is_some_and(|e| e.visited)
    }

    pub fn visited_count(&self) -> usize {
        self.exhibits.iter().filter(|e| e.visited).count()
    }

    /// Clear every visited flag for a fresh session.
    pub fn reset_visits(&mut self) {
        for e in &mut self.exhibits {
            e.visited = false;
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::museum_default()
    }
}

fn water_lilies() -> Exhibit {
    Exhibit {
        id: 84,
        title: "Water Lilies".to_string(),
        pose: Pose::new(0.5, 0.0, 0.0),
        description: "This painting is part of Claude Monet's Water Lilies series, created \
            between 1897 and 1926. It captures the surface of a pond in his garden at Giverny, \
            focusing on water lilies, reflections, and the shifting effects of light. Monet \
            painted outdoors to observe how color changed throughout the day. The absence of a \
            horizon or human presence emphasizes the immersive and abstract quality of the scene."
            .to_string(),
        detailed_description: "Monet's Water Lilies were part of a grand vision. He saw them \
            as a peaceful refuge and arranged their display in a specially designed oval room in \
            Paris. Despite cataracts, which may have influenced the dreamy, blurred forms, he kept \
            painting. Some panels stretch over six feet, immersing viewers in water and light."
            .to_string(),
        announcement: "The Monet exhibit is empty. Follow me!".to_string(),
        follow_up: "Anything else you want to know about this Monet?".to_string(),
        facts: vec![
            "A series of around 250 paintings created between 1897 and 1926".to_string(),
            "Depicts Monet's flower garden in Giverny, especially the pond and its water lilies"
                .to_string(),
            "Painted outdoors to capture natural light and color changes throughout the day"
                .to_string(),
            "Known for soft, layered brushstrokes and a dreamy, abstracted sense of reflection"
                .to_string(),
            "No human figures are present; the focus is entirely on water, light, and nature"
                .to_string(),
        ],
        popularity: 0.5,
        visited: false,
    }
}

fn starry_night() -> Exhibit {
    Exhibit {
        id: 80,
        title: "The Starry Night".to_string(),
        pose: Pose::new(0.25, 0.43, 1.05),
        description: "The Starry Night was painted by Vincent van Gogh in June 1889 while he \
            was staying at an asylum in Saint-Remy-de-Provence. It depicts a swirling night sky \
            over a quiet village, with exaggerated forms and vibrant colors. The painting reflects \
            Van Gogh's emotional state and his unique use of brushwork and color. It was based not \
            on a direct view, but a combination of memory and imagination!"
            .to_string(),
        detailed_description: "The Starry Night shows Van Gogh's early move toward \
            expressionism, using bold forms to convey emotion rather than realism. The cypress \
            tree, not seen from his window, was added from imagination and often symbolizes \
            eternity. Though now iconic, Van Gogh didn't think highly of the painting and called \
            it a 'failure' in a letter to his brother."
            .to_string(),
        announcement: "I see the Van Gogh exhibit is free; let's head there!".to_string(),
        follow_up: "Anything else you want to know about The Starry Night?".to_string(),
        facts: vec![
            "Painted in June 1889".to_string(),
            "Oil on canvas".to_string(),
            "Painted while Van Gogh was in an asylum in Saint-Remy-de-Provence".to_string(),
            "Features a swirling night sky over a quiet village with a cypress tree".to_string(),
            "Known for dynamic brushstrokes and vibrant blue-and-yellow contrast".to_string(),
            "Painted from memory, not direct observation".to_string(),
        ],
        popularity: 0.5,
        visited: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhibit(id: u32) -> Exhibit {
        Exhibit::new(id, format!("Exhibit {id}"), Pose::default(), "intro", "more", 0.5).unwrap()
    }

    #[test]
    fn default_catalog_order_matches_occupancy_slots() {
        let catalog = Catalog::museum_default();
        assert_eq!(catalog.index_of(84), Some(0));
        assert_eq!(catalog.index_of(80), Some(1));
        assert_eq!(catalog.index_of(7), None);
        assert!(catalog.iter().all(|e| !e.facts.is_empty()));
    }

    #[test]
    fn rejects_empty_and_duplicate_catalogs() {
        assert!(Catalog::new(Vec::new()).is_err());
        let err = Catalog::new(vec![exhibit(3), exhibit(3)]).unwrap_err();
        assert!(matches!(err, TourError::InvalidExhibit(_)));
    }

    #[test]
    fn mark_visited_is_idempotent() {
        let mut catalog = Catalog::new(vec![exhibit(1), exhibit(2)]).unwrap();
        assert!(catalog.mark_visited(2));
        assert!(!catalog.mark_visited(2));
        assert!(!catalog.mark_visited(99));
        assert_eq!(catalog.visited_count(), 1);
        assert!(catalog.is_visited(2));

        catalog.reset_visits();
        assert_eq!(catalog.visited_count(), 0);
    }
}
