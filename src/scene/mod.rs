//! Scene: the ordered object list plus the selection state.
//!
//! Insertion order is draw order. Ids are small positive integers so they
//! round-trip through the integer id attachment; 0 is the background
//! sentinel and is never allocated.

pub mod object;

pub use object::{Material, SceneObject, ShapeKind};

#[derive(Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    picked: Option<usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object, returning its index. Ids must be unique and
    /// non-zero; `allocate_id` hands out conforming ones.
    pub fn add(&mut self, object: SceneObject) -> usize {
        debug_assert!(object.id != 0, "id 0 is reserved for the background");
        debug_assert!(
            self.find_by_id(object.id).is_none(),
            "duplicate object id {}",
            object.id
        );
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Next free id: one past the largest live id, starting at 1.
    pub fn allocate_id(&self) -> u32 {
        self.objects.iter().map(|o| o.id).max().map_or(1, |m| m + 1)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Index of the object with the given id. The sentinel 0 never matches.
    pub fn find_by_id(&self, id: u32) -> Option<usize> {
        if id == 0 {
            return None;
        }
        self.objects.iter().position(|o| o.id == id)
    }

    pub fn select(&mut self, index: Option<usize>) {
        self.picked = index.filter(|&i| i < self.objects.len());
    }

    pub fn picked_index(&self) -> Option<usize> {
        self.picked
    }

    pub fn picked_object(&self) -> Option<&SceneObject> {
        self.picked.and_then(|i| self.objects.get(i))
    }

    pub fn picked_object_mut(&mut self) -> Option<&mut SceneObject> {
        match self.picked {
            Some(i) => self.objects.get_mut(i),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_id_starts_at_one() {
        let scene = Scene::new();
        assert_eq!(scene.allocate_id(), 1);
    }

    #[test]
    fn test_allocate_id_after_sparse_ids() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(1, ShapeKind::Quad));
        scene.add(SceneObject::new(50, ShapeKind::Cube));
        scene.add(SceneObject::new(100, ShapeKind::Torus));
        assert_eq!(scene.allocate_id(), 101);
    }

    #[test]
    fn test_find_by_id() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(1, ShapeKind::Quad));
        scene.add(SceneObject::new(50, ShapeKind::Cube));
        assert_eq!(scene.find_by_id(50), Some(1));
        assert_eq!(scene.find_by_id(2), None);
        // The sentinel never resolves, even if an object claimed it somehow.
        assert_eq!(scene.find_by_id(0), None);
    }

    #[test]
    fn test_select_out_of_bounds_clears() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(1, ShapeKind::Quad));
        scene.select(Some(0));
        assert_eq!(scene.picked_index(), Some(0));
        scene.select(Some(5));
        assert_eq!(scene.picked_index(), None);
    }

    #[test]
    fn test_insertion_order_is_draw_order() {
        let mut scene = Scene::new();
        scene.add(SceneObject::new(5, ShapeKind::Quad));
        scene.add(SceneObject::new(2, ShapeKind::Cube));
        let ids: Vec<u32> = scene.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![5, 2]);
    }
}
