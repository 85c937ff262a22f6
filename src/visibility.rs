use crate::model::{Annotation, AnnotationId, Bookmark, BookmarkId};

/// Half-width of the auto-display window, in seconds.
pub const VISIBILITY_WINDOW: f64 = 0.5;

/// Strictly inside the window: a distance of exactly `window` is outside.
pub fn within_window(timestamp: f64, current_time: f64, window: f64) -> bool {
    (timestamp - current_time).abs() < window
}

/// Ids of the annotations that should be on screen at `current_time`, in
/// list order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibleSet {
    ids: Vec<AnnotationId>,
}

impl VisibleSet {
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[AnnotationId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The visible annotations themselves, looked up in `annotations`.
    pub fn select<'a>(&'a self, annotations: &'a [Annotation]) -> impl Iterator<Item = &'a Annotation> + 'a {
        annotations.iter().filter(move |a| self.contains(a.id))
    }
}

/// Full recomputation over the list. Cheap enough to run on every time
/// update at the tens-to-hundreds of annotations a video carries.
pub fn visible(annotations: &[Annotation], current_time: f64) -> VisibleSet {
    visible_within(annotations, current_time, VISIBILITY_WINDOW)
}

pub fn visible_within(annotations: &[Annotation], current_time: f64, window: f64) -> VisibleSet {
    VisibleSet {
        ids: annotations
            .iter()
            .filter(|a| within_window(a.timestamp, current_time, window))
            .map(|a| a.id)
            .collect(),
    }
}

/// Bookmarks within the same window, for highlighting in the list.
pub fn bookmarks_near(bookmarks: &[Bookmark], current_time: f64) -> Vec<BookmarkId> {
    bookmarks
        .iter()
        .filter(|b| within_window(b.timestamp, current_time, VISIBILITY_WINDOW))
        .map(|b| b.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Shape, VideoId};

    fn ann(id: i64, timestamp: f64) -> Annotation {
        Annotation {
            id: AnnotationId(id),
            video_id: VideoId(1),
            timestamp,
            description: format!("a{id}"),
            shape: Shape::Note,
            created_by: None,
            created_at: None,
        }
    }

    #[test]
    fn boundary_of_window_is_excluded() {
        let list = vec![ann(1, 10.0)];
        assert!(visible(&list, 9.51).contains(AnnotationId(1)));
        assert!(visible(&list, 10.0).contains(AnnotationId(1)));
        assert!(visible(&list, 10.49).contains(AnnotationId(1)));
        assert!(visible(&list, 9.5).is_empty());
        assert!(visible(&list, 10.5).is_empty());
    }

    #[test]
    fn picks_every_annotation_in_range_in_list_order() {
        let list = vec![ann(1, 3.0), ann(2, 3.2), ann(3, 4.0), ann(4, 2.8)];
        let set = visible(&list, 3.1);
        assert_eq!(set.ids(), &[AnnotationId(1), AnnotationId(2), AnnotationId(4)]);

        let selected: Vec<i64> = set.select(&list).map(|a| a.id.0).collect();
        assert_eq!(selected, vec![1, 2, 4]);
    }

    #[test]
    fn empty_list_yields_empty_set() {
        assert!(visible(&[], 1.0).is_empty());
    }

    #[test]
    fn bookmarks_use_the_same_window() {
        let list = vec![Bookmark {
            id: BookmarkId(7),
            video_id: VideoId(1),
            timestamp: 5.0,
            title: "intro".into(),
            created_by: None,
            created_at: None,
        }];
        assert_eq!(bookmarks_near(&list, 5.2), vec![BookmarkId(7)]);
        assert!(bookmarks_near(&list, 5.5).is_empty());
    }
}
