//! STL models placed in a shared scene.

use crate::scene::TimerDriven;

use glam::Vec3;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("STL error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mesh contains no triangles")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub normal: Vec3,
    pub vertices: [Vec3; 3],
}

impl From<stl_io::Triangle> for Triangle {
    fn from(triangle: stl_io::Triangle) -> Self {
        let vec3 = |v: stl_io::Vector<f32>| Vec3::new(v[0], v[1], v[2]);
        Self {
            normal: vec3(triangle.normal),
            vertices: triangle.vertices.map(vec3),
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Read a binary or ASCII STL file, named after the file stem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut mesh = Self::read(&mut reader)?;
        if let Some(stem) = path.file_stem() {
            mesh.name = stem.to_string_lossy().into_owned();
        }
        debug!("read {} triangles from {}", mesh.triangles.len(), path.display());
        Ok(mesh)
    }

    /// Parse binary or ASCII STL held in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self, MeshError> {
        Self::read(&mut Cursor::new(bytes))
    }

    fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, MeshError> {
        let triangles = stl_io::create_stl_reader(reader)?
            .map(|triangle| triangle.map(Triangle::from))
            .collect::<Result<Vec<_>, _>>()?;
        if triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        Ok(Self {
            name: String::new(),
            triangles,
        })
    }

    pub fn bounds(&self) -> Bounds {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in self.triangles.iter().flat_map(|t| t.vertices) {
            min = min.min(vertex);
            max = max.max(vertex);
        }
        Bounds { min, max }
    }
}

/// Offset that centers `model` over `floor` in x and z and rests its lowest
/// point on the top of the floor.
pub fn floor_alignment(model: Bounds, floor: Bounds) -> Vec3 {
    let model_center = model.center();
    let floor_center = floor.center();
    Vec3::new(
        floor_center.x - model_center.x,
        floor.max.y - model.min.y,
        floor_center.z - model_center.z,
    )
}

/// A mesh placed in the scene at `position`.
#[derive(Clone, Debug)]
pub struct Actor {
    pub mesh: Mesh,
    pub position: Vec3,
}

impl Actor {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            position: Vec3::ZERO,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.mesh.bounds().translated(self.position)
    }

    pub fn place_on(&mut self, floor: &Actor) {
        self.position = floor_alignment(self.mesh.bounds(), floor.bounds());
    }
}

/// Moves an actor by a fixed step on every timer tick.
#[derive(Debug)]
pub struct ActorMotion {
    pub actor: Actor,
    pub step: Vec3,
    pub interval: Duration,
}

impl TimerDriven for ActorMotion {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn on_tick(&mut self) {
        self.actor.position += self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_CORNER: &str = "solid corner
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
  facet normal 0 -1 0
    outer loop
      vertex 0 0 0
      vertex 1 0 2
      vertex 1 0 0
    endloop
  endfacet
endsolid corner
";

    fn binary(triangles: &[[Vec3; 3]]) -> Vec<u8> {
        let vertex = |v: Vec3| stl_io::Vertex::new(v.to_array());
        let triangles: Vec<_> = triangles
            .iter()
            .map(|vertices| stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 1.0]),
                vertices: vertices.map(vertex),
            })
            .collect();
        let mut bytes = Cursor::new(Vec::new());
        stl_io::write_stl(&mut bytes, triangles.iter()).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn parses_ascii() {
        let mesh = Mesh::parse(CUBE_CORNER.as_bytes()).unwrap();
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.triangles[1].normal, Vec3::NEG_Y);
        assert_eq!(
            mesh.bounds(),
            Bounds {
                min: Vec3::ZERO,
                max: Vec3::new(1.0, 1.0, 2.0)
            }
        );
    }

    #[test]
    fn parses_binary() {
        let bytes = binary(&[[Vec3::ZERO, Vec3::X, Vec3::new(0.0, 3.0, -1.0)]]);
        let mesh = Mesh::parse(&bytes).unwrap();
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0].vertices[2], Vec3::new(0.0, 3.0, -1.0));
        assert_eq!(mesh.triangles[0].normal, Vec3::Z);
    }

    #[test]
    fn open_names_mesh_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("house.stl");
        std::fs::write(&path, binary(&[[Vec3::ZERO, Vec3::X, Vec3::Y]])).unwrap();
        let mesh = Mesh::open(&path).unwrap();
        assert_eq!(mesh.name, "house");
        assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = binary(&[[Vec3::ZERO, Vec3::X, Vec3::Y], [Vec3::X, Vec3::Y, Vec3::Z]]);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(Mesh::parse(&bytes), Err(MeshError::Io(_))));
    }

    #[test]
    fn malformed_ascii_is_rejected() {
        let text = "solid x\nfacet normal 0 0 1\nouter loop\nvertex 0 0 nope\n";
        assert!(matches!(Mesh::parse(text.as_bytes()), Err(MeshError::Io(_))));
    }

    #[test]
    fn model_rests_centered_on_floor() {
        let model = Bounds {
            min: Vec3::new(2.0, -1.0, 2.0),
            max: Vec3::new(4.0, 1.0, 6.0),
        };
        let floor = Bounds {
            min: Vec3::new(-10.0, -0.5, -10.0),
            max: Vec3::new(10.0, 0.0, 10.0),
        };
        let offset = floor_alignment(model, floor);
        assert_eq!(offset, Vec3::new(-3.0, 1.0, -4.0));

        let placed = model.translated(offset);
        assert_eq!(placed.min.y, floor.max.y);
        assert_eq!(placed.center().x, floor.center().x);
    }

    #[test]
    fn motion_translates_per_tick() {
        let mesh = Mesh::parse(CUBE_CORNER.as_bytes()).unwrap();
        let mut motion = ActorMotion {
            actor: Actor::new(mesh),
            step: Vec3::new(0.01, 0.0, 0.0),
            interval: Duration::from_millis(30),
        };
        for _ in 0..100 {
            motion.on_tick();
        }
        assert!((motion.actor.position.x - 1.0).abs() < 1e-4);
        assert_eq!(motion.actor.position.y, 0.0);
    }
}
