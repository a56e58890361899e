//! Hand-trimmed kernel struct layouts used by the probes.
//!
//! Only the fields the probes dereference are declared; leading fields we
//! skip over are collapsed into padding. Layouts match `include/linux/fs.h`
//! and `include/linux/dcache.h` on the 5.15/6.1 LTS kernels we target.
//! Regenerate with `aya-tool generate file dentry inode` if the target
//! kernel's layout drifts.

#![allow(non_camel_case_types)]

/// Kernel `struct qstr`: packed hash (low 32 bits) and length (high 32
/// bits), plus a pointer to the name bytes.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct qstr {
    pub hash_len: u64,
    pub name: *const u8,
}

impl qstr {
    #[inline(always)]
    pub fn len(&self) -> u32 {
        (self.hash_len >> 32) as u32
    }
}

#[repr(C)]
pub struct dentry {
    pub d_flags: u32,
    pub d_seq: u32,
    pub d_hash: [u64; 2],
    pub d_parent: *mut dentry,
    pub d_name: qstr,
    pub d_inode: *mut inode,
}

#[repr(C)]
pub struct inode {
    pub i_mode: u16,
    pub i_opflags: u16,
    pub i_uid: u32,
    pub i_gid: u32,
}

#[repr(C)]
pub struct vfsmount {
    _opaque: [u8; 0],
}

#[repr(C)]
pub struct path {
    pub mnt: *mut vfsmount,
    pub dentry: *mut dentry,
}

#[repr(C)]
pub struct file {
    pub _f_u: [u64; 2],
    pub f_path: path,
    pub f_inode: *mut inode,
}
