use std::{
    cell::{Ref, RefCell, RefMut},
    marker::PhantomData,
    ops::{Deref, DerefMut, Index, IndexMut},
    rc::{Rc, Weak},
};

use crate::{
    element::{Entity, Handle, EH, FH, RH, VH},
    error::Error,
};

/// Every property registered on one kind of entity. The container only holds
/// weak references, so dropping a property is how a tag gets removed from
/// the mesh.
pub(crate) struct PropertyContainer<H>
where
    H: Handle,
{
    props: Vec<Box<dyn GenericProperty>>,
    length: usize,
    _phantom: PhantomData<H>,
}

impl<H> Default for PropertyContainer<H>
where
    H: Handle,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H> PropertyContainer<H>
where
    H: Handle,
{
    pub fn new() -> Self {
        PropertyContainer {
            props: Vec::new(),
            length: 0,
            _phantom: PhantomData,
        }
    }

    fn push_property(&mut self, prop: Box<dyn GenericProperty>) {
        // Dead properties are dropped lazily, whenever a new one comes along.
        self.garbage_collection();
        self.props.push(prop);
    }

    /// Append a default value to every live property.
    pub fn push_value(&mut self) -> Result<(), Error> {
        for prop in self.props.iter_mut() {
            prop.push()?;
        }
        self.length += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn garbage_collection(&mut self) {
        self.props.retain(|prop| prop.is_valid())
    }

    pub fn num_properties(&self) -> usize {
        self.props.iter().filter(|p| p.is_valid()).count()
    }
}

trait GenericProperty {
    fn push(&mut self) -> Result<(), Error>;

    fn is_valid(&self) -> bool;
}

/// Buffer containing the property values, indexed by the entity handle `H`.
///
/// To access this buffer from the property that owns it, you have to borrow
/// it as either [`Ref`](std::cell::Ref) or [`RefMut`](std::cell::RefMut).
pub struct PropBuf<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    buf: Vec<T>,
    _phantom: PhantomData<H>,
}

impl<H, T> Index<H> for PropBuf<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    type Output = T;

    fn index(&self, handle: H) -> &Self::Output {
        &self.buf[handle.index() as usize]
    }
}

impl<H, T> IndexMut<H> for PropBuf<H, T>
where
    H: Handle,
    T: Copy + Clone + 'static,
{
    fn index_mut(&mut self, h: H) -> &mut Self::Output {
        &mut self.buf[h.index() as usize]
    }
}

impl<H, T> Deref for PropBuf<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl<H, T> DerefMut for PropBuf<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// A value of type `T` defined on every entity whose handle type is `H`.
///
/// Entities added to the mesh after the property was created receive the
/// default value, so the property never goes out of sync with the mesh the
/// way a plain [`Vec<T>`] would. Deleted entities keep their value, which is
/// what lets an edit be rolled back without losing data.
#[derive(Clone)]
pub struct Property<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    data: Rc<RefCell<PropBuf<H, T>>>,
    default: T,
}

impl<H, T> Property<H, T>
where
    H: Handle,
    T: Clone + Copy + 'static,
{
    pub(crate) fn new(container: &mut PropertyContainer<H>, default: T) -> Self {
        let prop = Property {
            data: Rc::new(RefCell::new(PropBuf {
                buf: vec![default; container.len()],
                _phantom: PhantomData,
            })),
            default,
        };
        container.push_property(Box::new(WeakProperty::<H, T> {
            data: Rc::downgrade(&prop.data),
            default,
        }));
        prop
    }

    /// Try to borrow the property with read-only access.
    ///
    /// Properties use interior mutability, so borrowing can fail at runtime
    /// with [`Error::BorrowedPropertyAccess`].
    pub fn try_borrow(&self) -> Result<Ref<PropBuf<H, T>>, Error> {
        self.data
            .try_borrow()
            .map_err(|_| Error::BorrowedPropertyAccess)
    }

    /// Try to borrow the property with mutable access.
    pub fn try_borrow_mut(&mut self) -> Result<RefMut<PropBuf<H, T>>, Error> {
        self.data
            .try_borrow_mut()
            .map_err(|_| Error::BorrowedPropertyAccess)
    }

    /// Get the value stored for the entity `h`.
    pub fn get(&self, h: H) -> Result<T, Error> {
        let buf = self.try_borrow()?;
        Ok(buf[h])
    }

    /// Set the value stored for the entity `h`.
    pub fn set(&mut self, h: H, val: T) -> Result<(), Error> {
        let mut buf = self.try_borrow_mut()?;
        buf[h] = val;
        Ok(())
    }

    /// Set every value of this property back to the default.
    pub fn reset(&mut self) -> Result<(), Error> {
        let default = self.default;
        self.try_borrow_mut()?.fill(default);
        Ok(())
    }
}

pub type VProperty<T> = Property<VH, T>;
pub type EProperty<T> = Property<EH, T>;
pub type FProperty<T> = Property<FH, T>;
pub type RProperty<T> = Property<RH, T>;

/// A per-entity tag covering all four entity dimensions.
///
/// This is what the shape correction code attaches to the mesh: it is created
/// with [`Mesh::create_tag`](crate::Mesh::create_tag) and removed from the
/// mesh as soon as it is dropped.
#[derive(Clone)]
pub struct Tag<T>
where
    T: Clone + Copy,
{
    vertices: VProperty<T>,
    edges: EProperty<T>,
    faces: FProperty<T>,
    regions: RProperty<T>,
}

impl<T> Tag<T>
where
    T: Clone + Copy + 'static,
{
    pub(crate) fn new(
        vertices: VProperty<T>,
        edges: EProperty<T>,
        faces: FProperty<T>,
        regions: RProperty<T>,
    ) -> Self {
        Tag {
            vertices,
            edges,
            faces,
            regions,
        }
    }

    pub fn get(&self, e: Entity) -> Result<T, Error> {
        match e {
            Entity::Vertex(h) => self.vertices.get(h),
            Entity::Edge(h) => self.edges.get(h),
            Entity::Face(h) => self.faces.get(h),
            Entity::Region(h) => self.regions.get(h),
        }
    }

    pub fn set(&mut self, e: Entity, val: T) -> Result<(), Error> {
        match e {
            Entity::Vertex(h) => self.vertices.set(h, val),
            Entity::Edge(h) => self.edges.set(h, val),
            Entity::Face(h) => self.faces.set(h, val),
            Entity::Region(h) => self.regions.set(h, val),
        }
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.vertices.reset()?;
        self.edges.reset()?;
        self.faces.reset()?;
        self.regions.reset()
    }
}

/// This is what lives inside the property container. It doesn't control the
/// lifetime of the property, but grows the buffer whenever an entity is added
/// to the mesh.
struct WeakProperty<H, T>
where
    H: Handle,
    T: Clone + Copy,
{
    data: Weak<RefCell<PropBuf<H, T>>>,
    default: T,
}

impl<H, T> GenericProperty for WeakProperty<H, T>
where
    T: Clone + Copy,
    H: Handle,
{
    fn push(&mut self) -> Result<(), Error> {
        if let Some(prop) = self.data.upgrade() {
            prop.try_borrow_mut()
                .map_err(|_| Error::BorrowedPropertyAccess)?
                .buf
                .push(self.default);
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.data.upgrade().is_some()
    }
}

#[cfg(test)]
mod test {
    use super::{PropertyContainer, VProperty};
    use crate::element::VH;

    #[test]
    fn t_garbage_collection() {
        let mut container = PropertyContainer::<VH>::new();
        assert_eq!(container.props.len(), 0);
        {
            let _prop0 = VProperty::<u32>::new(&mut container, 0);
            assert_eq!(container.num_properties(), 1);
            {
                let _prop1 = VProperty::<u16>::new(&mut container, 0);
                assert_eq!(container.num_properties(), 2);
            }
            assert_eq!(container.props.len(), 2);
            assert_eq!(container.num_properties(), 1);
            container.garbage_collection();
            assert_eq!(container.props.len(), 1);
        }
        assert_eq!(container.num_properties(), 0);
        let _prop = VProperty::<u8>::new(&mut container, 0);
        // Registering a new property drops the dead ones.
        assert_eq!(container.props.len(), 1);
    }

    #[test]
    fn t_push_keeps_props_in_sync() {
        let mut container = PropertyContainer::<VH>::new();
        container.push_value().expect("Cannot push value");
        let mut prop = VProperty::<u32>::new(&mut container, 42);
        assert_eq!(prop.try_borrow().expect("Cannot borrow").len(), 1);
        container.push_value().expect("Cannot push value");
        container.push_value().expect("Cannot push value");
        assert_eq!(container.len(), 3);
        prop.set(2u32.into(), 7).expect("Cannot set value");
        assert_eq!(
            prop.try_borrow().expect("Cannot borrow").to_vec(),
            vec![42, 42, 7]
        );
        prop.reset().expect("Cannot reset");
        assert_eq!(prop.get(2u32.into()).expect("Cannot get"), 42);
    }

    #[test]
    fn t_borrow_conflict() {
        let mut container = PropertyContainer::<VH>::new();
        container.push_value().expect("Cannot push value");
        let prop = VProperty::<u32>::new(&mut container, 0);
        let mut alias = prop.clone();
        let _held = prop.try_borrow().expect("Cannot borrow");
        assert!(alias.set(0u32.into(), 1).is_err());
    }
}
