//! 网格的持久化存储.
//!
//! 只支持写入, 不支持解析. 坐标单位为毫米.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::surface::{IndexedMesh, Mesh};
use crate::LungResult;

/// 表明一个可以保存为常见网格文件格式的对象.
pub trait MeshWrite {
    /// 以 ASCII STL 格式写入 `w`. 每个三角形带有单位法向.
    fn write_stl<W: Write>(&self, name: &str, w: W) -> LungResult<()>;

    /// 以 Wavefront OBJ 格式写入 `w`. 坐标相同的顶点只写入一次.
    fn write_obj<W: Write>(&self, w: W) -> LungResult<()>;

    /// 保存为 ASCII STL 文件. solid 名称取文件名 (不含扩展名).
    fn save_stl<P: AsRef<Path>>(&self, path: P) -> LungResult<()> {
        let path = path.as_ref();
        let name = solid_name(path);
        let mut w = BufWriter::new(File::create(path)?);
        self.write_stl(&name, &mut w)?;
        w.flush()?;
        Ok(())
    }

    /// 保存为 Wavefront OBJ 文件.
    fn save_obj<P: AsRef<Path>>(&self, path: P) -> LungResult<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_obj(&mut w)?;
        w.flush()?;
        Ok(())
    }
}

#[inline]
fn solid_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .replace(char::is_whitespace, "_")
}

impl MeshWrite for Mesh {
    fn write_stl<W: Write>(&self, name: &str, mut w: W) -> LungResult<()> {
        writeln!(w, "solid {name}")?;
        for (t, n) in self.triangles().iter().zip(self.normals()) {
            writeln!(w, "  facet normal {:e} {:e} {:e}", n[0], n[1], n[2])?;
            writeln!(w, "    outer loop")?;
            for p in t {
                writeln!(w, "      vertex {:e} {:e} {:e}", p[0], p[1], p[2])?;
            }
            writeln!(w, "    endloop")?;
            writeln!(w, "  endfacet")?;
        }
        writeln!(w, "endsolid {name}")?;
        Ok(())
    }

    #[inline]
    fn write_obj<W: Write>(&self, w: W) -> LungResult<()> {
        self.to_indexed().write_obj(w)
    }
}

impl MeshWrite for IndexedMesh {
    #[inline]
    fn write_stl<W: Write>(&self, name: &str, w: W) -> LungResult<()> {
        self.to_mesh().write_stl(name, w)
    }

    fn write_obj<W: Write>(&self, mut w: W) -> LungResult<()> {
        for p in &self.vertices {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2])?;
        }
        // OBJ 下标从 1 开始.
        for [a, b, c] in &self.faces {
            writeln!(w, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
        Ok(())
    }
}
