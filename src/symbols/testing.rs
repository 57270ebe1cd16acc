//! Builds small ELF images in memory so extractor and mapper tests do not
//! depend on checked-in binaries.

use byteorder::{LittleEndian, WriteBytesExt};
use object::elf;

struct TestSymbol {
    name: String,
    st_type: u8,
    defined: bool,
    value: u64,
    size: u64,
}

struct TestSection {
    name: &'static str,
    sh_type: u32,
    data: Vec<u8>,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
}

pub(crate) struct ElfBuilder {
    is_64: bool,
    big_endian: bool,
    program_headers: Vec<(u32, u64)>,
    symbols: Option<Vec<TestSymbol>>,
    build_id: Option<Vec<u8>>,
    soname: Option<String>,
    debug_info: bool,
}

impl ElfBuilder {
    pub(crate) fn elf64() -> Self {
        Self {
            is_64: true,
            big_endian: false,
            program_headers: vec![],
            symbols: None,
            build_id: None,
            soname: None,
            debug_info: false,
        }
    }

    pub(crate) fn elf32() -> Self {
        Self {
            is_64: false,
            ..Self::elf64()
        }
    }

    /// Marks the image big-endian in its identification bytes only.
    pub(crate) fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub(crate) fn program_header(mut self, p_type: u32, vaddr: u64) -> Self {
        self.program_headers.push((p_type, vaddr));
        self
    }

    pub(crate) fn load_segment(self, vaddr: u64) -> Self {
        self.program_header(elf::PT_LOAD, vaddr)
    }

    pub(crate) fn empty_symtab(mut self) -> Self {
        self.symbols.get_or_insert_with(Vec::new);
        self
    }

    pub(crate) fn symbol(
        mut self,
        name: &str,
        st_type: u8,
        defined: bool,
        value: u64,
        size: u64,
    ) -> Self {
        self.symbols.get_or_insert_with(Vec::new).push(TestSymbol {
            name: name.to_string(),
            st_type,
            defined,
            value,
            size,
        });
        self
    }

    pub(crate) fn function(self, name: &str, value: u64, size: u64) -> Self {
        self.symbol(name, elf::STT_FUNC, true, value, size)
    }

    pub(crate) fn build_id(mut self, build_id: &[u8]) -> Self {
        self.build_id = Some(build_id.to_vec());
        self
    }

    pub(crate) fn soname(mut self, soname: &str) -> Self {
        self.soname = Some(soname.to_string());
        self
    }

    pub(crate) fn debug_info(mut self) -> Self {
        self.debug_info = true;
        self
    }

    fn word(&self, out: &mut Vec<u8>, value: u64) {
        if self.is_64 {
            out.write_u64::<LittleEndian>(value).unwrap();
        } else {
            out.write_u32::<LittleEndian>(value as u32).unwrap();
        }
    }

    fn sections(&self) -> Vec<TestSection> {
        let mut sections = vec![];

        // Index 1 is always .shstrtab, its data is filled in by build().
        sections.push(TestSection {
            name: ".shstrtab",
            sh_type: elf::SHT_STRTAB,
            data: vec![],
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
        });

        if let Some(symbols) = &self.symbols {
            let mut strtab = vec![0u8];
            let mut symtab = vec![0u8; if self.is_64 { 24 } else { 16 }];
            for symbol in symbols {
                let st_name = strtab.len() as u32;
                strtab.extend_from_slice(symbol.name.as_bytes());
                strtab.push(0);

                let st_info = (elf::STB_GLOBAL << 4) | symbol.st_type;
                let st_shndx = if symbol.defined { 1 } else { elf::SHN_UNDEF };
                symtab.write_u32::<LittleEndian>(st_name).unwrap();
                if self.is_64 {
                    symtab.push(st_info);
                    symtab.push(0);
                    symtab.write_u16::<LittleEndian>(st_shndx).unwrap();
                    symtab.write_u64::<LittleEndian>(symbol.value).unwrap();
                    symtab.write_u64::<LittleEndian>(symbol.size).unwrap();
                } else {
                    symtab.write_u32::<LittleEndian>(symbol.value as u32).unwrap();
                    symtab.write_u32::<LittleEndian>(symbol.size as u32).unwrap();
                    symtab.push(st_info);
                    symtab.push(0);
                    symtab.write_u16::<LittleEndian>(st_shndx).unwrap();
                }
            }

            let strtab_index = sections.len() as u32 + 2;
            sections.push(TestSection {
                name: ".symtab",
                sh_type: elf::SHT_SYMTAB,
                data: symtab,
                link: strtab_index,
                info: 1,
                align: 8,
                entsize: if self.is_64 { 24 } else { 16 },
            });
            sections.push(TestSection {
                name: ".strtab",
                sh_type: elf::SHT_STRTAB,
                data: strtab,
                link: 0,
                info: 0,
                align: 1,
                entsize: 0,
            });
        }

        if let Some(build_id) = &self.build_id {
            let mut note = vec![];
            note.write_u32::<LittleEndian>(4).unwrap();
            note.write_u32::<LittleEndian>(build_id.len() as u32).unwrap();
            note.write_u32::<LittleEndian>(elf::NT_GNU_BUILD_ID).unwrap();
            note.extend_from_slice(b"GNU\0");
            note.extend_from_slice(build_id);
            while note.len() % 4 != 0 {
                note.push(0);
            }
            sections.push(TestSection {
                name: ".note.gnu.build-id",
                sh_type: elf::SHT_NOTE,
                data: note,
                link: 0,
                info: 0,
                align: 4,
                entsize: 0,
            });
        }

        if let Some(soname) = &self.soname {
            let mut dynstr = vec![0u8];
            dynstr.extend_from_slice(soname.as_bytes());
            dynstr.push(0);

            let mut dynamic = vec![];
            self.word(&mut dynamic, u64::from(elf::DT_SONAME));
            self.word(&mut dynamic, 1);
            self.word(&mut dynamic, u64::from(elf::DT_NULL));
            self.word(&mut dynamic, 0);

            let dynstr_index = sections.len() as u32 + 1;
            sections.push(TestSection {
                name: ".dynstr",
                sh_type: elf::SHT_STRTAB,
                data: dynstr,
                link: 0,
                info: 0,
                align: 1,
                entsize: 0,
            });
            sections.push(TestSection {
                name: ".dynamic",
                sh_type: elf::SHT_DYNAMIC,
                data: dynamic,
                link: dynstr_index,
                info: 0,
                align: 8,
                entsize: if self.is_64 { 16 } else { 8 },
            });
        }

        if self.debug_info {
            sections.push(TestSection {
                name: ".debug_info",
                sh_type: elf::SHT_PROGBITS,
                data: vec![],
                link: 0,
                info: 0,
                align: 1,
                entsize: 0,
            });
        }

        sections
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut sections = self.sections();

        let mut shstrtab = vec![0u8];
        let mut name_offsets = vec![];
        for section in &sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(section.name.as_bytes());
            shstrtab.push(0);
        }
        sections[0].data = shstrtab;

        let (ehsize, phentsize, shentsize) = if self.is_64 {
            (64u64, 56u64, 64u64)
        } else {
            (52, 32, 40)
        };
        let align8 = |offset: u64| (offset + 7) & !7;

        let phoff = if self.program_headers.is_empty() {
            0
        } else {
            ehsize
        };
        let mut offset = ehsize + phentsize * self.program_headers.len() as u64;
        let mut section_offsets = vec![];
        for section in &sections {
            offset = align8(offset);
            section_offsets.push(offset);
            offset += section.data.len() as u64;
        }
        let shoff = align8(offset);
        let shnum = sections.len() as u16 + 1;

        let mut out = vec![];
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
        out.push(if self.is_64 {
            elf::ELFCLASS64
        } else {
            elf::ELFCLASS32
        });
        out.push(if self.big_endian {
            elf::ELFDATA2MSB
        } else {
            elf::ELFDATA2LSB
        });
        out.push(elf::EV_CURRENT);
        out.extend_from_slice(&[0; 9]);
        out.write_u16::<LittleEndian>(elf::ET_DYN).unwrap();
        out.write_u16::<LittleEndian>(if self.is_64 {
            elf::EM_X86_64
        } else {
            elf::EM_386
        })
        .unwrap();
        out.write_u32::<LittleEndian>(u32::from(elf::EV_CURRENT))
            .unwrap();
        self.word(&mut out, 0);
        self.word(&mut out, phoff);
        self.word(&mut out, shoff);
        out.write_u32::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(ehsize as u16).unwrap();
        out.write_u16::<LittleEndian>(phentsize as u16).unwrap();
        out.write_u16::<LittleEndian>(self.program_headers.len() as u16)
            .unwrap();
        out.write_u16::<LittleEndian>(shentsize as u16).unwrap();
        out.write_u16::<LittleEndian>(shnum).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();

        for &(p_type, vaddr) in &self.program_headers {
            let flags = elf::PF_R | elf::PF_X;
            out.write_u32::<LittleEndian>(p_type).unwrap();
            if self.is_64 {
                out.write_u32::<LittleEndian>(flags).unwrap();
            }
            self.word(&mut out, 0);
            self.word(&mut out, vaddr);
            self.word(&mut out, vaddr);
            self.word(&mut out, 0);
            self.word(&mut out, 0x1000);
            if !self.is_64 {
                out.write_u32::<LittleEndian>(flags).unwrap();
            }
            self.word(&mut out, 0x1000);
        }

        for (section, &section_offset) in sections.iter().zip(&section_offsets) {
            out.resize(section_offset as usize, 0);
            out.extend_from_slice(&section.data);
        }
        out.resize(shoff as usize, 0);

        // Null section header.
        out.resize(out.len() + shentsize as usize, 0);
        for ((section, &section_offset), &name_offset) in
            sections.iter().zip(&section_offsets).zip(&name_offsets)
        {
            out.write_u32::<LittleEndian>(name_offset).unwrap();
            out.write_u32::<LittleEndian>(section.sh_type).unwrap();
            self.word(&mut out, 0);
            self.word(&mut out, 0);
            self.word(&mut out, section_offset);
            self.word(&mut out, section.data.len() as u64);
            out.write_u32::<LittleEndian>(section.link).unwrap();
            out.write_u32::<LittleEndian>(section.info).unwrap();
            self.word(&mut out, section.align);
            self.word(&mut out, section.entsize);
        }

        out
    }
}
